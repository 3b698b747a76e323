// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod database;
pub mod error;
pub mod exporter;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod utils;

pub use config::{ArchiveConfig, Config, DatabaseConfig, DriftPolicy, IngestionConfig};
pub use database::{
    EnsuredTable, FileArchive, InventoryImport, InventoryStore, RegistryEntry, RowStore,
    SchemaRegistry, SchemaRepair, SqliteClient, TableStatus,
};
pub use error::{IngestError, Result};
pub use exporter::{ExportManifest, ExportedTable, JsonExporter};
pub use models::{
    Document, DocumentFormat, ExtractedTable, InventoryItem, StoredFile, StoredRow,
};
pub use parser::{HeaderNormalizer, TableExtractor, extract_tables};
pub use pipeline::{
    BatchItem, FileScanner, IngestReport, IngestStats, Ingestor, ProgressTracker, ScannedFile,
    TableOutcome, TableReport,
};
pub use utils::Validator;
