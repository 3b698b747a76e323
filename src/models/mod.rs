// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod document;
pub mod inventory;
pub mod stored_file;
pub mod table;

pub use document::{Document, DocumentFormat};
pub use inventory::InventoryItem;
pub use stored_file::StoredFile;
pub use table::{ExtractedTable, StoredRow};
