// file: src/database/mod.rs
// description: database operations module exports
// reference: internal module structure

pub mod archive;
pub mod client;
pub mod inventory;
pub mod rows;
pub mod schema;

pub use archive::FileArchive;
pub use client::{SqliteClient, quote_ident};
pub use inventory::{InventoryImport, InventoryStore};
pub use rows::RowStore;
pub use schema::{EnsuredTable, RegistryEntry, SchemaRegistry, SchemaRepair, TableStatus};
