// file: src/database/inventory.rs
// description: typed parts inventory imported from spreadsheet tables
// reference: https://docs.rs/rusqlite

use crate::database::client::SqliteClient;
use crate::error::{IngestError, Result};
use crate::models::inventory::{AVAILABLE_QUANTITY, PART_NAME, PART_NUMBER, REQUIRED_QUANTITY};
use crate::models::{ExtractedTable, InventoryItem};
use rusqlite::params;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryImport {
    pub inserted: usize,
    pub duplicates: usize,
    /// One message per rejected row, with its 1-based data row number.
    pub rejected: Vec<String>,
}

/// Positions of the four inventory columns within an extracted header.
struct ColumnMap {
    part_name: usize,
    part_number: usize,
    available: usize,
    required: usize,
}

impl ColumnMap {
    fn resolve(header: &[String]) -> Result<Self> {
        let find = |wanted: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(wanted))
                .ok_or_else(|| {
                    IngestError::Validation(format!("inventory table has no '{}' column", wanted))
                })
        };

        Ok(Self {
            part_name: find(PART_NAME)?,
            part_number: find(PART_NUMBER)?,
            available: find(AVAILABLE_QUANTITY)?,
            required: find(REQUIRED_QUANTITY)?,
        })
    }
}

pub struct InventoryStore<'a> {
    client: &'a SqliteClient,
}

impl<'a> InventoryStore<'a> {
    pub fn new(client: &'a SqliteClient) -> Self {
        Self { client }
    }

    /// Imports every data row of `table`. Rows with unparseable quantities
    /// are rejected individually; exact duplicates of stored items are skipped.
    pub fn import_table(&self, table: &ExtractedTable) -> Result<InventoryImport> {
        let columns = ColumnMap::resolve(&table.header)?;
        let mut report = InventoryImport::default();

        let tx = self.client.connection().unchecked_transaction()?;
        for (idx, row) in table.rows.iter().enumerate() {
            let part_name = cell(row, columns.part_name).trim();
            let part_number = cell(row, columns.part_number).trim();

            let quantities = parse_quantity(cell(row, columns.available), AVAILABLE_QUANTITY)
                .and_then(|available| {
                    parse_quantity(cell(row, columns.required), REQUIRED_QUANTITY)
                        .map(|required| (available, required))
                });
            let (available, required) = match quantities {
                Ok(pair) => pair,
                Err(message) => {
                    warn!("Inventory row {} rejected: {}", idx + 1, message);
                    report.rejected.push(format!("row {}: {}", idx + 1, message));
                    continue;
                }
            };

            if part_name.is_empty() && part_number.is_empty() {
                report.rejected.push(format!("row {}: no part name or number", idx + 1));
                continue;
            }

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM __inventory
                 WHERE part_name = ?1 AND part_number = ?2
                   AND available_quantity = ?3 AND required_quantity = ?4)",
                params![part_name, part_number, available, required],
                |r| r.get(0),
            )?;
            if exists {
                report.duplicates += 1;
                continue;
            }

            tx.execute(
                "INSERT INTO __inventory
                    (part_name, part_number, available_quantity, required_quantity)
                 VALUES (?1, ?2, ?3, ?4)",
                params![part_name, part_number, available, required],
            )?;
            report.inserted += 1;
        }
        tx.commit()?;

        info!(
            "Inventory import from '{}': {} inserted, {} duplicates, {} rejected",
            table.name,
            report.inserted,
            report.duplicates,
            report.rejected.len()
        );
        Ok(report)
    }

    pub fn list(&self) -> Result<Vec<InventoryItem>> {
        let mut stmt = self.client.connection().prepare(
            "SELECT id, part_name, part_number, available_quantity, required_quantity
             FROM __inventory ORDER BY id",
        )?;

        let items = stmt
            .query_map([], |row| {
                Ok(InventoryItem {
                    id: row.get(0)?,
                    part_name: row.get(1)?,
                    part_number: row.get(2)?,
                    available_quantity: row.get(3)?,
                    required_quantity: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    /// Sets both quantities of item `id`. A missing id is a no-op reported as `false`.
    pub fn update_quantity(&self, id: i64, available: i64, required: i64) -> Result<bool> {
        if available < 0 || required < 0 {
            return Err(IngestError::Validation(
                "quantities cannot be negative".to_string(),
            ));
        }

        let changed = self.client.connection().execute(
            "UPDATE __inventory SET available_quantity = ?1, required_quantity = ?2 WHERE id = ?3",
            params![available, required, id],
        )?;

        Ok(changed > 0)
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

/// Accepts plain integers and integral floats such as `"4.0"`.
fn parse_quantity(raw: &str, column: &str) -> std::result::Result<i64, String> {
    let trimmed = raw.trim();

    let value = match trimmed.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let f = trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .ok_or_else(|| format!("{} '{}' is not a whole number", column, trimmed))?;
            // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive
            if f < i64::MIN as f64 || f >= i64::MAX as f64 {
                return Err(format!("{} '{}' is out of range", column, trimmed));
            }
            f as i64
        }
    };

    if value < 0 {
        return Err(format!("{} is negative ({})", column, value));
    }
    Ok(value)
}
