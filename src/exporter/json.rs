// file: src/exporter/json.rs
// description: json export of stored tables

use crate::config::DriftPolicy;
use crate::database::{RowStore, SchemaRegistry, SqliteClient};
use crate::error::{IngestError, Result};
use crate::models::StoredRow;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

lazy_static! {
    static ref UNSAFE_FILE_CHARS: Regex =
        Regex::new(r"[^\p{L}\p{N}._-]+").expect("UNSAFE_FILE_CHARS regex is valid");
}

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
    pretty: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportedTable {
    pub table: String,
    pub header: Vec<String>,
    pub source: Option<String>,
    pub exported_at: String,
    pub rows: Vec<StoredRow>,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub total_tables: usize,
    pub total_rows: usize,
    pub files: Vec<String>,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>, pretty: bool) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|source| IngestError::FileOperation {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self { output_dir, pretty })
    }

    /// Writes one table to `<output_dir>/<table>.json` and returns the path.
    pub fn export_table(&self, client: &SqliteClient, table: &str) -> Result<PathBuf> {
        let source = SchemaRegistry::new(client, DriftPolicy::default())
            .entries()?
            .into_iter()
            .find(|entry| entry.table_name == table)
            .and_then(|entry| entry.source);

        let exported = self.collect(client, table, source)?;
        self.write(&exported, &file_stem_for(table))
    }

    /// Exports every user table plus a `manifest.json`.
    pub fn export_all(&self, client: &SqliteClient) -> Result<ExportManifest> {
        info!("Starting JSON export to {}", self.output_dir.display());

        let sources: HashMap<String, Option<String>> = SchemaRegistry::new(client, DriftPolicy::default())
            .entries()?
            .into_iter()
            .map(|entry| (entry.table_name, entry.source))
            .collect();

        let mut files = Vec::new();
        let mut total_rows = 0;
        let mut used_stems = HashSet::from(["manifest".to_string()]);
        let tables = client.list_tables()?;

        for table in &tables {
            let exported = self.collect(client, table, sources.get(table).cloned().flatten())?;
            total_rows += exported.rows.len();
            let stem = unique_stem(file_stem_for(table), &mut used_stems);
            let path = self.write(&exported, &stem)?;
            files.push(path.to_string_lossy().to_string());
        }

        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            total_tables: tables.len(),
            total_rows,
            files,
        };

        let manifest_path = self.output_dir.join("manifest.json");
        self.write_json(&manifest_path, &manifest)?;

        info!(
            "Export complete: {} tables, {} rows",
            manifest.total_tables, manifest.total_rows
        );
        Ok(manifest)
    }

    fn collect(&self, client: &SqliteClient, table: &str, source: Option<String>) -> Result<ExportedTable> {
        let rows = RowStore::new(client);
        let header = rows.columns(table)?;
        let stored = rows.read_all(table, &header)?;

        Ok(ExportedTable {
            table: table.to_string(),
            header,
            source,
            exported_at: Utc::now().to_rfc3339(),
            rows: stored,
        })
    }

    fn write(&self, exported: &ExportedTable, stem: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("{}.json", stem));
        self.write_json(&path, exported)?;
        debug!("Wrote {} rows to {}", exported.rows.len(), path.display());
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, path: &PathBuf, value: &T) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| IngestError::Serialization(e.to_string()))?;

        fs::write(path, json).map_err(|source| IngestError::FileOperation {
            path: path.clone(),
            source,
        })
    }
}

/// Table names may hold any character; file names keep a safe subset.
fn file_stem_for(table: &str) -> String {
    let stem = UNSAFE_FILE_CHARS.replace_all(table, "_");
    let stem = stem.trim_matches('_');
    if stem.is_empty() || stem.starts_with('.') {
        format!("table_{}", stem)
    } else {
        stem.to_string()
    }
}

/// Suffixes `_2`, `_3`, ... until the stem is unused in this export. Stems
/// are compared lowercased for case-insensitive file systems.
fn unique_stem(stem: String, used: &mut HashSet<String>) -> String {
    if used.insert(stem.to_lowercase()) {
        return stem;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", stem, n);
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}
