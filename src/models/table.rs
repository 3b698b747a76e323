// file: src/models/table.rs
// description: extracted and stored table shapes
// reference: internal data structures

use serde::{Deserialize, Serialize};

/// A table pulled out of a document, keyed by its normalized header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    /// Builds a table whose rows are padded or truncated to the header width.
    pub fn new(name: impl Into<String>, header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self {
            name: name.into(),
            header,
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }
}

/// One persisted tuple. `values` follow the header order used to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: i64,
    pub values: Vec<String>,
}
