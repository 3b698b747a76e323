// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

pub mod ingest;
mod progress;
pub mod scanner;

pub use ingest::{BatchItem, IngestReport, Ingestor, TableOutcome, TableReport};
pub use progress::{IngestStats, ProgressTracker};
pub use scanner::{FileScanner, ScannedFile};
