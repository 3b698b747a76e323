// file: src/database/rows.rs
// description: row persistence for dynamically shaped relations
// reference: https://docs.rs/rusqlite

use crate::database::client::{SqliteClient, quote_ident};
use crate::database::schema::{ID_COLUMN, SchemaRegistry};
use crate::error::{IngestError, Result};
use crate::models::{ExtractedTable, StoredRow};
use crate::utils::Validator;
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, info};

pub struct RowStore<'a> {
    client: &'a SqliteClient,
}

impl<'a> RowStore<'a> {
    pub fn new(client: &'a SqliteClient) -> Self {
        Self { client }
    }

    /// Inserts `row` unless a tuple with identical values in every header
    /// column already exists.
    ///
    /// The existence check and the insert are two statements; two writers
    /// racing on the same row can both insert it.
    pub fn insert_if_absent(&self, name: &str, header: &[String], row: &[String]) -> Result<bool> {
        self.require_table(name)?;
        Validator::validate_row_width(name, header, row)?;
        insert_row(self.client.connection(), name, header, row)
    }

    /// Inserts every row of `table` into relation `stored_as` in one
    /// transaction. Returns how many rows were new.
    pub fn insert_table(&self, stored_as: &str, table: &ExtractedTable) -> Result<usize> {
        self.require_table(stored_as)?;

        let tx = self.client.connection().unchecked_transaction()?;
        let mut inserted = 0;
        for row in &table.rows {
            Validator::validate_row_width(stored_as, &table.header, row)?;
            if insert_row(&tx, stored_as, &table.header, row)? {
                inserted += 1;
            }
        }
        tx.commit()?;

        debug!(
            "Inserted {}/{} rows into '{}'",
            inserted,
            table.rows.len(),
            stored_as
        );
        Ok(inserted)
    }

    /// Every row projected onto `header`, oldest first.
    pub fn read_all(&self, name: &str, header: &[String]) -> Result<Vec<StoredRow>> {
        Validator::validate_table_name(name)?;
        self.require_table(name)?;
        self.require_columns(name, header)?;

        let projection = std::iter::once(ID_COLUMN.to_string())
            .chain(header.iter().map(|column| quote_ident(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            projection,
            quote_ident(name),
            ID_COLUMN
        );

        let mut stmt = self.client.connection().prepare(&sql)?;
        let width = header.len();
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let mut values = Vec::with_capacity(width);
                for idx in 1..=width {
                    values.push(row.get::<_, Option<String>>(idx)?.unwrap_or_default());
                }
                Ok(StoredRow { id, values })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Replaces the values of row `id`. A missing table or id is a no-op
    /// reported as `false`.
    pub fn update_row(
        &self,
        name: &str,
        header: &[String],
        id: i64,
        values: &[String],
    ) -> Result<bool> {
        Validator::validate_table_name(name)?;
        Validator::validate_row_width(name, header, values)?;

        if !self.client.table_exists(name)? {
            debug!("Update skipped: table '{}' does not exist", name);
            return Ok(false);
        }
        self.require_columns(name, header)?;

        let assignments = header
            .iter()
            .enumerate()
            .map(|(idx, column)| format!("{} = ?{}", quote_ident(column), idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(name),
            assignments,
            ID_COLUMN,
            header.len() + 1
        );

        let mut bound: Vec<&dyn rusqlite::ToSql> =
            values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        bound.push(&id);

        let changed = self
            .client
            .connection()
            .execute(&sql, bound.as_slice())?;

        Ok(changed > 0)
    }

    /// Drops the relation and its registry entry. Absent tables are a no-op.
    pub fn drop_table(&self, name: &str) -> Result<bool> {
        if !self.client.table_exists(name)? {
            debug!("Drop skipped: table '{}' does not exist", name);
            return Ok(false);
        }
        Validator::validate_table_name(name)?;

        let tx = self.client.connection().unchecked_transaction()?;
        tx.execute_batch(&format!("DROP TABLE {}", quote_ident(name)))?;
        SchemaRegistry::forget(&tx, name)?;
        tx.commit()?;

        info!("Dropped table '{}'", name);
        Ok(true)
    }

    /// Deletes every row but keeps the relation. Returns the rows removed.
    pub fn clear_table(&self, name: &str) -> Result<usize> {
        self.require_table(name)?;
        Validator::validate_table_name(name)?;

        let removed = self
            .client
            .connection()
            .execute(&format!("DELETE FROM {}", quote_ident(name)), [])?;

        info!("Cleared {} rows from '{}'", removed, name);
        Ok(removed)
    }

    /// Value columns of the live relation, `id` excluded.
    pub fn columns(&self, name: &str) -> Result<Vec<String>> {
        self.require_table(name)?;
        Ok(self
            .client
            .table_columns(name)?
            .into_iter()
            .filter(|column| column != ID_COLUMN)
            .collect())
    }

    pub fn row_count(&self, name: &str) -> Result<u64> {
        self.require_table(name)?;
        self.client.row_count(name)
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        self.client.list_tables()
    }

    fn require_table(&self, name: &str) -> Result<()> {
        if self.client.table_exists(name)? {
            Ok(())
        } else {
            Err(IngestError::NotFound(format!("table '{}'", name)))
        }
    }

    fn require_columns(&self, name: &str, header: &[String]) -> Result<()> {
        let live = self.columns(name)?;
        if let Some(missing) = header
            .iter()
            .find(|column| !live.iter().any(|l| l.eq_ignore_ascii_case(column)))
        {
            return Err(IngestError::schema(
                name,
                format!("no column named '{}'", missing),
            ));
        }
        Ok(())
    }
}

fn insert_row(connection: &Connection, name: &str, header: &[String], row: &[String]) -> Result<bool> {
    let table = quote_ident(name);

    let predicate = header
        .iter()
        .enumerate()
        .map(|(idx, column)| format!("{} IS ?{}", quote_ident(column), idx + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    let exists_sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {})", table, predicate);

    let exists: bool = connection.query_row(&exists_sql, params_from_iter(row.iter()), |r| r.get(0))?;
    if exists {
        return Ok(false);
    }

    let columns = header
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=header.len())
        .map(|idx| format!("?{}", idx))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!("INSERT INTO {} ({}) VALUES ({})", table, columns, placeholders);

    connection.execute(&insert_sql, params_from_iter(row.iter()))?;
    Ok(true)
}
