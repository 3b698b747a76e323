// file: src/database/schema.rs
// description: schema registry for dynamic relations and internal table bootstrap
// reference: https://www.sqlite.org/lang_createtable.html

use crate::config::DriftPolicy;
use crate::database::client::{SqliteClient, quote_ident};
use crate::error::{IngestError, Result};
use crate::utils::Validator;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info, warn};

pub const ID_COLUMN: &str = "id";
pub const REGISTRY_TABLE: &str = "__schema_registry";
pub const FILES_TABLE: &str = "__stored_files";
pub const INVENTORY_TABLE: &str = "__inventory";

struct InternalTable {
    name: &'static str,
    columns: &'static [&'static str],
    ddl: &'static str,
}

const INTERNAL_TABLES: &[InternalTable] = &[
    InternalTable {
        name: REGISTRY_TABLE,
        columns: &["table_name", "header", "source", "created_at"],
        ddl: "CREATE TABLE IF NOT EXISTS __schema_registry (
                table_name TEXT PRIMARY KEY COLLATE NOCASE,
                header TEXT NOT NULL,
                source TEXT,
                created_at TEXT NOT NULL
            )",
    },
    InternalTable {
        name: FILES_TABLE,
        columns: &[
            "id",
            "collection",
            "file_name",
            "content_type",
            "sha256",
            "size",
            "uploaded_at",
            "file_data",
        ],
        ddl: "CREATE TABLE IF NOT EXISTS __stored_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                file_name TEXT NOT NULL,
                content_type TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                size INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL,
                file_data BLOB NOT NULL
            )",
    },
    InternalTable {
        name: INVENTORY_TABLE,
        columns: &[
            "id",
            "part_name",
            "part_number",
            "available_quantity",
            "required_quantity",
        ],
        ddl: "CREATE TABLE IF NOT EXISTS __inventory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                part_name TEXT NOT NULL,
                part_number TEXT NOT NULL,
                available_quantity INTEGER NOT NULL,
                required_quantity INTEGER NOT NULL
            )",
    },
];

/// Creates the internal tables when missing.
pub(crate) fn bootstrap(connection: &Connection) -> rusqlite::Result<()> {
    for table in INTERNAL_TABLES {
        connection.execute_batch(table.ddl)?;
    }
    Ok(())
}

/// How `ensure_table` resolved the requested relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Created,
    Existing,
    /// The relation was dropped and recreated empty. Rows were lost.
    Recreated { discarded_rows: u64 },
    /// Header drift was resolved by storing under a versioned name.
    Versioned { base: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnsuredTable {
    pub stored_as: String,
    #[serde(flatten)]
    pub status: TableStatus,
}

impl EnsuredTable {
    pub fn lost_data(&self) -> bool {
        matches!(self.status, TableStatus::Recreated { discarded_rows } if discarded_rows > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub table_name: String,
    pub header: Vec<String>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An internal table that had to be rebuilt because its columns were wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRepair {
    pub table: String,
    pub discarded_rows: u64,
}

pub struct SchemaRegistry<'a> {
    client: &'a SqliteClient,
    policy: DriftPolicy,
}

impl<'a> SchemaRegistry<'a> {
    pub fn new(client: &'a SqliteClient, policy: DriftPolicy) -> Self {
        Self { client, policy }
    }

    /// Makes sure `name` exists with exactly `header` as its value columns.
    ///
    /// A registered relation with a different header is handled by the drift
    /// policy. A relation whose live columns disagree with what is expected is
    /// dropped and recreated empty, reported as `Recreated`.
    ///
    /// Names are matched ignoring ASCII case; `stored_as` carries the spelling
    /// the relation was first created with.
    pub fn ensure_table(
        &self,
        name: &str,
        header: &[String],
        source: Option<&str>,
    ) -> Result<EnsuredTable> {
        Validator::validate_table_name(name)?;
        Validator::validate_header(name, header)?;

        let stored = self.stored_spelling(name)?;
        if stored != name {
            debug!("Table '{}' resolves to existing '{}'", name, stored);
        }
        let name = stored.as_str();

        match self.registered_header(name)? {
            Some(stored) if stored.as_slice() == header => {
                let status = self.ensure_exact(name, header, source)?;
                Ok(EnsuredTable {
                    stored_as: name.to_string(),
                    status,
                })
            }
            Some(stored) => self.resolve_drift(name, stored, header, source),
            None => {
                let status = self.ensure_exact(name, header, source)?;
                Ok(EnsuredTable {
                    stored_as: name.to_string(),
                    status,
                })
            }
        }
    }

    fn resolve_drift(
        &self,
        name: &str,
        stored: Vec<String>,
        header: &[String],
        source: Option<&str>,
    ) -> Result<EnsuredTable> {
        match self.policy {
            DriftPolicy::Reject => Err(IngestError::HeaderDrift {
                table: name.to_string(),
                stored,
                incoming: header.to_vec(),
            }),
            DriftPolicy::Replace => {
                let discarded_rows = self.recreate(name, header, source)?;
                warn!(
                    "Header drift on '{}': replaced relation, {} rows discarded",
                    name, discarded_rows
                );
                Ok(EnsuredTable {
                    stored_as: name.to_string(),
                    status: TableStatus::Recreated { discarded_rows },
                })
            }
            DriftPolicy::Version => {
                let mut version = 2;
                loop {
                    let candidate = self.stored_spelling(&format!("{}_v{}", name, version))?;
                    if !self.version_slot_usable(&candidate, header)? {
                        version += 1;
                        continue;
                    }

                    self.ensure_exact(&candidate, header, source)?;
                    info!("Header drift on '{}': storing as '{}'", name, candidate);
                    return Ok(EnsuredTable {
                        stored_as: candidate,
                        status: TableStatus::Versioned {
                            base: name.to_string(),
                        },
                    });
                }
            }
        }
    }

    /// A versioned name is only taken when it is free or already holds exactly
    /// `header`; an occupied slot is never recreated.
    fn version_slot_usable(&self, candidate: &str, header: &[String]) -> Result<bool> {
        if let Some(existing) = self.registered_header(candidate)?
            && existing.as_slice() != header
        {
            return Ok(false);
        }

        if !self.client.table_exists(candidate)? {
            return Ok(true);
        }
        self.live_header_matches(candidate, header)
    }

    /// Registry spelling first, then the live catalog, else `name` itself.
    fn stored_spelling(&self, name: &str) -> Result<String> {
        let registered: Option<String> = self
            .client
            .connection()
            .query_row(
                "SELECT table_name FROM __schema_registry WHERE table_name = ?1 COLLATE NOCASE",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(registered) = registered {
            return Ok(registered);
        }
        Ok(self
            .client
            .stored_table_name(name)?
            .unwrap_or_else(|| name.to_string()))
    }

    /// Creates, adopts, or repairs `name` so its live columns equal `header`.
    fn ensure_exact(&self, name: &str, header: &[String], source: Option<&str>) -> Result<TableStatus> {
        if !self.client.table_exists(name)? {
            self.create(name, header, source)?;
            info!("Created table '{}' with {} columns", name, header.len());
            return Ok(TableStatus::Created);
        }

        if self.live_header_matches(name, header)? {
            if self.registered_header(name)?.is_none() {
                debug!("Adopting unregistered table '{}'", name);
                self.register(self.client.connection(), name, header, source)?;
            }
            return Ok(TableStatus::Existing);
        }

        let discarded_rows = self.recreate(name, header, source)?;
        warn!(
            "Table '{}' did not match its expected columns; recreated empty, {} rows discarded",
            name, discarded_rows
        );
        Ok(TableStatus::Recreated { discarded_rows })
    }

    fn live_header_matches(&self, name: &str, header: &[String]) -> Result<bool> {
        let columns = self.client.table_columns(name)?;
        let matches = columns.first().is_some_and(|first| first == ID_COLUMN)
            && columns.len() == header.len() + 1
            && columns[1..].iter().zip(header).all(|(live, want)| live == want);
        Ok(matches)
    }

    fn create(&self, name: &str, header: &[String], source: Option<&str>) -> Result<()> {
        let tx = self.client.connection().unchecked_transaction()?;
        tx.execute_batch(&create_table_sql(name, header))?;
        self.register(&tx, name, header, source)?;
        tx.commit()?;
        Ok(())
    }

    fn recreate(&self, name: &str, header: &[String], source: Option<&str>) -> Result<u64> {
        let discarded_rows = if self.client.table_exists(name)? {
            self.client.row_count(name)?
        } else {
            0
        };

        let tx = self.client.connection().unchecked_transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)))?;
        tx.execute_batch(&create_table_sql(name, header))?;
        self.register(&tx, name, header, source)?;
        tx.commit()?;

        Ok(discarded_rows)
    }

    fn register(
        &self,
        connection: &Connection,
        name: &str,
        header: &[String],
        source: Option<&str>,
    ) -> Result<()> {
        let header_json =
            serde_json::to_string(header).map_err(|e| IngestError::Serialization(e.to_string()))?;

        connection.execute(
            "INSERT INTO __schema_registry (table_name, header, source, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(table_name) DO UPDATE SET
                header = excluded.header,
                source = excluded.source,
                created_at = excluded.created_at",
            params![name, header_json, source, Utc::now()],
        )?;
        Ok(())
    }

    pub fn registered_header(&self, name: &str) -> Result<Option<Vec<String>>> {
        let header_json: Option<String> = self
            .client
            .connection()
            .query_row(
                "SELECT header FROM __schema_registry WHERE table_name = ?1 COLLATE NOCASE",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        header_json
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    IngestError::schema(name, format!("corrupt registry header: {}", e))
                })
            })
            .transpose()
    }

    pub fn entries(&self) -> Result<Vec<RegistryEntry>> {
        let mut stmt = self.client.connection().prepare(
            "SELECT table_name, header, source, created_at
             FROM __schema_registry ORDER BY created_at, table_name",
        )?;

        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, DateTime<Utc>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(table_name, header_json, source, created_at)| {
                let header = serde_json::from_str(&header_json).map_err(|e| {
                    IngestError::schema(&table_name, format!("corrupt registry header: {}", e))
                })?;
                Ok(RegistryEntry {
                    table_name,
                    header,
                    source,
                    created_at,
                })
            })
            .collect()
    }

    /// Removes the registry entry; used when the relation is dropped.
    pub(crate) fn forget(connection: &Connection, name: &str) -> Result<()> {
        connection.execute(
            "DELETE FROM __schema_registry WHERE table_name = ?1 COLLATE NOCASE",
            params![name],
        )?;
        Ok(())
    }

    /// Checks the internal tables and rebuilds any whose columns are wrong.
    pub fn verify_internal_tables(&self) -> Result<Vec<SchemaRepair>> {
        let mut repairs = Vec::new();

        for table in INTERNAL_TABLES {
            if !self.client.table_exists(table.name)? {
                warn!("Internal table '{}' missing, creating", table.name);
                self.client.connection().execute_batch(table.ddl)?;
                continue;
            }

            let live = self.client.table_columns(table.name)?;
            if live.iter().map(String::as_str).eq(table.columns.iter().copied()) {
                debug!("Internal table '{}' verified", table.name);
                continue;
            }

            let discarded_rows = self.client.row_count(table.name)?;
            warn!(
                "Internal table '{}' has columns {:?}; recreating, {} rows discarded",
                table.name, live, discarded_rows
            );

            let tx = self.client.connection().unchecked_transaction()?;
            tx.execute_batch(&format!("DROP TABLE {}", quote_ident(table.name)))?;
            tx.execute_batch(table.ddl)?;
            tx.commit()?;

            repairs.push(SchemaRepair {
                table: table.name.to_string(),
                discarded_rows,
            });
        }

        Ok(repairs)
    }

    /// Registered relations whose live columns no longer match the registry.
    pub fn find_mismatches(&self) -> Result<Vec<String>> {
        let mut mismatched = Vec::new();
        for entry in self.entries()? {
            if !self.client.table_exists(&entry.table_name)?
                || !self.live_header_matches(&entry.table_name, &entry.header)?
            {
                mismatched.push(entry.table_name);
            }
        }
        Ok(mismatched)
    }
}

fn create_table_sql(name: &str, header: &[String]) -> String {
    let columns = header
        .iter()
        .map(|column| format!("{} TEXT", quote_ident(column)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE {} ({} INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        quote_ident(name),
        ID_COLUMN,
        columns
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_create_then_existing() {
        let client = SqliteClient::open_in_memory().unwrap();
        let registry = SchemaRegistry::new(&client, DriftPolicy::Reject);
        let cols = header(&["Part", "Qty"]);

        let first = registry.ensure_table("T", &cols, Some("a.docx")).unwrap();
        assert_eq!(first.status, TableStatus::Created);
        assert_eq!(first.stored_as, "T");

        let second = registry.ensure_table("T", &cols, None).unwrap();
        assert_eq!(second.status, TableStatus::Existing);
        assert_eq!(client.table_columns("T").unwrap(), vec!["id", "Part", "Qty"]);
        assert_eq!(registry.registered_header("T").unwrap(), Some(cols));
    }

    #[test]
    fn test_drift_rejected_by_default() {
        let client = SqliteClient::open_in_memory().unwrap();
        let registry = SchemaRegistry::new(&client, DriftPolicy::Reject);
        registry.ensure_table("T", &header(&["Part"]), None).unwrap();

        let err = registry
            .ensure_table("T", &header(&["Part", "Qty"]), None)
            .unwrap_err();
        assert!(matches!(err, IngestError::HeaderDrift { .. }));
        assert_eq!(client.table_columns("T").unwrap(), vec!["id", "Part"]);
    }

    #[test]
    fn test_drift_replace_reports_data_loss() {
        let client = SqliteClient::open_in_memory().unwrap();
        let registry = SchemaRegistry::new(&client, DriftPolicy::Replace);
        registry.ensure_table("T", &header(&["Part"]), None).unwrap();
        client
            .connection()
            .execute("INSERT INTO \"T\" (\"Part\") VALUES ('Bolt')", [])
            .unwrap();

        let ensured = registry
            .ensure_table("T", &header(&["Part", "Qty"]), None)
            .unwrap();
        assert_eq!(ensured.status, TableStatus::Recreated { discarded_rows: 1 });
        assert!(ensured.lost_data());
        assert_eq!(client.row_count("T").unwrap(), 0);
        assert_eq!(client.table_columns("T").unwrap(), vec!["id", "Part", "Qty"]);
    }

    #[test]
    fn test_drift_version_picks_free_name() {
        let client = SqliteClient::open_in_memory().unwrap();
        let registry = SchemaRegistry::new(&client, DriftPolicy::Version);
        registry.ensure_table("T", &header(&["A"]), None).unwrap();

        let v2 = registry.ensure_table("T", &header(&["A", "B"]), None).unwrap();
        assert_eq!(v2.stored_as, "T_v2");
        assert_eq!(v2.status, TableStatus::Versioned { base: "T".to_string() });

        let again = registry.ensure_table("T", &header(&["A", "B"]), None).unwrap();
        assert_eq!(again.stored_as, "T_v2");

        let v3 = registry.ensure_table("T", &header(&["C"]), None).unwrap();
        assert_eq!(v3.stored_as, "T_v3");
    }

    #[test]
    fn test_names_differing_in_case_share_one_relation() {
        let client = SqliteClient::open_in_memory().unwrap();
        let registry = SchemaRegistry::new(&client, DriftPolicy::Reject);
        let cols = header(&["Part", "Qty"]);

        registry.ensure_table("Pumps", &cols, None).unwrap();
        let upper = registry.ensure_table("PUMPS", &cols, None).unwrap();

        assert_eq!(upper.stored_as, "Pumps");
        assert_eq!(upper.status, TableStatus::Existing);
        assert_eq!(client.list_tables().unwrap(), vec!["Pumps".to_string()]);
        assert_eq!(registry.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_drift_version_skips_occupied_slot() {
        let client = SqliteClient::open_in_memory().unwrap();
        client
            .connection()
            .execute_batch(
                "CREATE TABLE \"T_v2\" (id INTEGER PRIMARY KEY, legacy TEXT);
                 INSERT INTO \"T_v2\" (legacy) VALUES ('a'), ('b');",
            )
            .unwrap();

        let registry = SchemaRegistry::new(&client, DriftPolicy::Version);
        registry.ensure_table("T", &header(&["A"]), None).unwrap();
        let ensured = registry.ensure_table("T", &header(&["A", "B"]), None).unwrap();

        assert_eq!(ensured.stored_as, "T_v3");
        assert!(!ensured.lost_data());
        assert_eq!(client.row_count("T_v2").unwrap(), 2);
        assert_eq!(client.table_columns("T_v2").unwrap(), vec!["id", "legacy"]);
    }

    #[test]
    fn test_malformed_unregistered_relation_is_recreated() {
        let client = SqliteClient::open_in_memory().unwrap();
        client
            .connection()
            .execute_batch(
                "CREATE TABLE \"Notes\" (id INTEGER PRIMARY KEY, data TEXT);
                 INSERT INTO \"Notes\" (data) VALUES ('x'), ('y');",
            )
            .unwrap();

        let registry = SchemaRegistry::new(&client, DriftPolicy::Reject);
        let ensured = registry
            .ensure_table("Notes", &header(&["file_name"]), None)
            .unwrap();

        assert_eq!(ensured.status, TableStatus::Recreated { discarded_rows: 2 });
        assert_eq!(client.table_columns("Notes").unwrap(), vec!["id", "file_name"]);
    }

    #[test]
    fn test_matching_unregistered_relation_is_adopted() {
        let client = SqliteClient::open_in_memory().unwrap();
        client
            .connection()
            .execute_batch("CREATE TABLE \"Legacy\" (id INTEGER PRIMARY KEY AUTOINCREMENT, \"A\" TEXT)")
            .unwrap();

        let registry = SchemaRegistry::new(&client, DriftPolicy::Reject);
        let ensured = registry.ensure_table("Legacy", &header(&["A"]), None).unwrap();

        assert_eq!(ensured.status, TableStatus::Existing);
        assert_eq!(registry.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_reserved_and_bad_headers() {
        let client = SqliteClient::open_in_memory().unwrap();
        let registry = SchemaRegistry::new(&client, DriftPolicy::Reject);

        assert!(registry.ensure_table("__hidden", &header(&["A"]), None).is_err());
        assert!(registry.ensure_table("T", &header(&["id", "A"]), None).is_err());
        assert!(registry.ensure_table("T", &header(&[]), None).is_err());
        assert!(registry.ensure_table("T", &header(&["A", "a"]), None).is_err());
    }

    #[test]
    fn test_verify_repairs_malformed_internal_table() {
        let client = SqliteClient::open_in_memory().unwrap();
        client
            .connection()
            .execute_batch(
                "DROP TABLE __stored_files;
                 CREATE TABLE __stored_files (id INTEGER PRIMARY KEY, file_data BLOB);
                 INSERT INTO __stored_files (file_data) VALUES (x'00');",
            )
            .unwrap();

        let registry = SchemaRegistry::new(&client, DriftPolicy::Reject);
        let repairs = registry.verify_internal_tables().unwrap();

        assert_eq!(
            repairs,
            vec![SchemaRepair {
                table: FILES_TABLE.to_string(),
                discarded_rows: 1,
            }]
        );
        assert!(registry.verify_internal_tables().unwrap().is_empty());
    }

    #[test]
    fn test_find_mismatches() {
        let client = SqliteClient::open_in_memory().unwrap();
        let registry = SchemaRegistry::new(&client, DriftPolicy::Reject);
        registry.ensure_table("Good", &header(&["A"]), None).unwrap();
        registry.ensure_table("Bad", &header(&["A"]), None).unwrap();
        client
            .connection()
            .execute_batch("ALTER TABLE \"Bad\" ADD COLUMN extra TEXT")
            .unwrap();

        assert_eq!(registry.find_mismatches().unwrap(), vec!["Bad".to_string()]);
    }
}
