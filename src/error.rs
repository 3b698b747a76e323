// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot extract tables from {document}: {message}")]
    Extraction { document: String, message: String },

    #[error("Schema error on table '{table}': {message}")]
    Schema { table: String, message: String },

    #[error("Header drift on table '{table}': stored {stored:?}, incoming {incoming:?}")]
    HeaderDrift {
        table: String,
        stored: Vec<String>,
        incoming: Vec<String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IngestError {
    pub fn extraction(document: &str, message: impl Into<String>) -> Self {
        Self::Extraction {
            document: document.to_string(),
            message: message.into(),
        }
    }

    pub fn schema(table: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// True for the error kinds that callers treat as a silent no-op.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
