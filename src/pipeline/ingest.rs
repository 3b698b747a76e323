// file: src/pipeline/ingest.rs
// description: per-document ingestion from extraction through schema registry into the row store
// reference: coordinates extraction and storage for one or many documents

use crate::config::IngestionConfig;
use crate::database::{RowStore, SchemaRegistry, SqliteClient, TableStatus};
use crate::error::{IngestError, Result};
use crate::models::{Document, ExtractedTable};
use crate::parser;
use crate::pipeline::progress::ProgressTracker;
use crate::pipeline::scanner::ScannedFile;
use crate::utils::Validator;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Created,
    Existing,
    Recreated { discarded_rows: u64 },
    Versioned { base: String },
    Failed,
}

impl From<TableStatus> for TableOutcome {
    fn from(status: TableStatus) -> Self {
        match status {
            TableStatus::Created => Self::Created,
            TableStatus::Existing => Self::Existing,
            TableStatus::Recreated { discarded_rows } => Self::Recreated { discarded_rows },
            TableStatus::Versioned { base } => Self::Versioned { base },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub name: String,
    pub stored_as: Option<String>,
    pub outcome: TableOutcome,
    pub rows_seen: usize,
    pub rows_inserted: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub document: String,
    pub tables: Vec<TableReport>,
}

impl IngestReport {
    pub fn stored_count(&self) -> usize {
        self.tables
            .iter()
            .filter(|t| t.outcome != TableOutcome::Failed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.tables.len() - self.stored_count()
    }

    pub fn rows_inserted(&self) -> usize {
        self.tables.iter().map(|t| t.rows_inserted).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Result of one file in a batch run.
#[derive(Debug)]
pub struct BatchItem {
    pub relative_path: String,
    pub result: Result<IngestReport>,
}

pub struct Ingestor<'a> {
    client: &'a SqliteClient,
    config: IngestionConfig,
}

impl<'a> Ingestor<'a> {
    pub fn new(client: &'a SqliteClient, config: &IngestionConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Extracts every table of `document` and stores each in turn.
    ///
    /// An extraction failure aborts the whole document. A storage failure
    /// only marks that table as failed: tables stored before it stay
    /// committed and later tables are still attempted.
    pub fn ingest(&self, document: &Document) -> Result<IngestReport> {
        Validator::validate_size(&document.name, document.size(), self.config.max_file_size_mb)?;

        let tables = parser::extract_tables(document)?;
        if tables.is_empty() {
            warn!("No tables with data rows found in {}", document.name);
        }

        let reports = tables
            .iter()
            .map(|table| self.store_table(table, &document.name))
            .collect();

        let report = IngestReport {
            document: document.name.clone(),
            tables: reports,
        };

        info!(
            "Ingested {}: {} tables stored, {} failed, {} new rows",
            report.document,
            report.stored_count(),
            report.failed_count(),
            report.rows_inserted()
        );
        Ok(report)
    }

    pub fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        Validator::validate_file_path(path)?;

        let bytes = fs::read(path).map_err(|source| IngestError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        self.ingest(&Document::new(name, bytes))
    }

    /// Ingests scanned files one after another, feeding the tracker.
    pub fn ingest_batch(&self, files: &[ScannedFile], progress: &ProgressTracker) -> Vec<BatchItem> {
        files
            .iter()
            .map(|file| {
                progress.set_message(file.relative_path.clone());
                let result = self.ingest_path(&file.path);

                match &result {
                    Ok(report) => progress.record_report(report, file.size),
                    Err(e) => {
                        error!("Failed to ingest {}: {}", file.relative_path, e);
                        progress.inc_files_failed();
                    }
                }

                BatchItem {
                    relative_path: file.relative_path.clone(),
                    result,
                }
            })
            .collect()
    }

    fn store_table(&self, table: &ExtractedTable, source: &str) -> TableReport {
        match self.try_store_table(table, source) {
            Ok((stored_as, outcome, rows_inserted)) => TableReport {
                name: table.name.clone(),
                stored_as: Some(stored_as),
                outcome,
                rows_seen: table.rows.len(),
                rows_inserted,
                error: None,
            },
            Err(e) => {
                warn!("Table '{}' from {} not stored: {}", table.name, source, e);
                TableReport {
                    name: table.name.clone(),
                    stored_as: None,
                    outcome: TableOutcome::Failed,
                    rows_seen: table.rows.len(),
                    rows_inserted: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn try_store_table(
        &self,
        table: &ExtractedTable,
        source: &str,
    ) -> Result<(String, TableOutcome, usize)> {
        let registry = SchemaRegistry::new(self.client, self.config.header_drift);
        let rows = RowStore::new(self.client);

        let ensured = registry.ensure_table(&table.name, &table.header, Some(source))?;
        if ensured.lost_data() {
            warn!(
                "Stored rows of '{}' were discarded while storing {}",
                ensured.stored_as, source
            );
        }

        if self.config.clear_before_ingest && ensured.status == TableStatus::Existing {
            rows.clear_table(&ensured.stored_as)?;
        }

        let inserted = rows.insert_table(&ensured.stored_as, table)?;
        Ok((ensured.stored_as, ensured.status.into(), inserted))
    }
}
