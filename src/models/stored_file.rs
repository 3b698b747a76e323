// file: src/models/stored_file.rs
// description: metadata for archived upload blobs
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: i64,
    pub collection: String,
    pub file_name: String,
    pub content_type: String,
    pub sha256: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn size_kib(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}
