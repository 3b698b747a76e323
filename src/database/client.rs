// file: src/database/client.rs
// description: SQLite store handle with connection management and catalog queries
// reference: https://docs.rs/rusqlite

use crate::config::DatabaseConfig;
use crate::database::schema;
use crate::error::{IngestError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Quotes an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Explicitly constructed store handle; the caller owns its lifecycle.
pub struct SqliteClient {
    connection: Connection,
    path: Option<PathBuf>,
}

impl SqliteClient {
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        info!("Opening SQLite store at {}", config.path.display());

        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| IngestError::FileOperation {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let connection = Connection::open(&config.path)?;
        connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        schema::bootstrap(&connection)?;

        Ok(Self {
            connection,
            path: Some(config.path.clone()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        schema::bootstrap(&connection)?;

        Ok(Self {
            connection,
            path: None,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn ping(&self) -> Result<bool> {
        debug!("Checking SQLite connection");
        let one: i64 = self.connection.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(one == 1)
    }

    /// SQLite identifiers ignore ASCII case, so `Pumps` and `PUMPS` name the
    /// same relation.
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        Ok(self.stored_table_name(table_name)?.is_some())
    }

    /// The spelling a relation was created with, matched ignoring ASCII case.
    pub fn stored_table_name(&self, table_name: &str) -> Result<Option<String>> {
        let found = self
            .connection
            .query_row(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![table_name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(found)
    }

    /// User relations, oldest first. Internal `__` tables are hidden.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.connection.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table'
               AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
               AND name NOT LIKE '\\_\\_%' ESCAPE '\\'
             ORDER BY rowid",
        )?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(names)
    }

    /// Every column of a relation in declaration order, `id` included.
    pub fn table_columns(&self, table_name: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .connection
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;

        let columns = stmt
            .query_map(params![table_name], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(columns)
    }

    pub fn row_count(&self, table_name: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name));
        let count: i64 = self.connection.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("Part"), "\"Part\"");
        assert_eq!(quote_ident("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let config = DatabaseConfig {
            path: temp.path().join("nested/dir/store.db"),
            busy_timeout_ms: 100,
        };

        let client = SqliteClient::open(&config).unwrap();
        assert!(client.ping().unwrap());
        assert!(config.path.exists());
    }

    #[test]
    fn test_internal_tables_hidden_from_listing() {
        let client = SqliteClient::open_in_memory().unwrap();
        assert!(client.table_exists(schema::REGISTRY_TABLE).unwrap());
        assert!(client.list_tables().unwrap().is_empty());

        client
            .connection()
            .execute_batch("CREATE TABLE \"Burner\" (id INTEGER PRIMARY KEY, \"a\" TEXT)")
            .unwrap();
        assert_eq!(client.list_tables().unwrap(), vec!["Burner".to_string()]);
        assert_eq!(client.table_columns("Burner").unwrap(), vec!["id", "a"]);
        assert_eq!(client.row_count("Burner").unwrap(), 0);
    }

    #[test]
    fn test_table_lookup_ignores_case() {
        let client = SqliteClient::open_in_memory().unwrap();
        client
            .connection()
            .execute_batch("CREATE TABLE \"Pumps\" (id INTEGER PRIMARY KEY, \"a\" TEXT)")
            .unwrap();

        assert!(client.table_exists("PUMPS").unwrap());
        assert_eq!(
            client.stored_table_name("pumps").unwrap(),
            Some("Pumps".to_string())
        );
        assert_eq!(client.stored_table_name("Valves").unwrap(), None);
    }
}
