// file: src/utils/validation.rs
// description: input validation for table names, headers, collections and uploads
// reference: input validation patterns

use crate::database::schema::ID_COLUMN;
use crate::error::{IngestError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Prefixes reserved for SQLite catalogs and the store's own tables.
const RESERVED_PREFIXES: &[&str] = &["sqlite_", "__"];

const MAX_IDENTIFIER_LEN: usize = 255;

pub struct Validator;

impl Validator {
    pub fn validate_table_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(IngestError::schema(name, "table name is empty"));
        }

        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(IngestError::schema(
                name,
                format!("table name longer than {} bytes", MAX_IDENTIFIER_LEN),
            ));
        }

        let lowered = name.to_ascii_lowercase();
        if RESERVED_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
            return Err(IngestError::schema(name, "table name uses a reserved prefix"));
        }

        if name.contains('\0') {
            return Err(IngestError::schema(name, "table name contains a NUL byte"));
        }

        Ok(())
    }

    /// A header must be non-empty, free of blanks, free of the reserved `id`
    /// column and unique under ASCII case folding.
    pub fn validate_header(table: &str, header: &[String]) -> Result<()> {
        if header.is_empty() {
            return Err(IngestError::schema(table, "header has no columns"));
        }

        let mut seen = HashSet::new();
        for column in header {
            if column.trim().is_empty() {
                return Err(IngestError::schema(table, "header contains a blank column"));
            }
            if column.contains('\0') {
                return Err(IngestError::schema(table, "column name contains a NUL byte"));
            }
            if column.eq_ignore_ascii_case(ID_COLUMN) {
                return Err(IngestError::schema(
                    table,
                    format!("column '{}' collides with the row id", column),
                ));
            }
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(IngestError::schema(
                    table,
                    format!("duplicate column '{}'", column),
                ));
            }
        }

        Ok(())
    }

    pub fn validate_row_width(table: &str, header: &[String], values: &[String]) -> Result<()> {
        if header.len() != values.len() {
            return Err(IngestError::Validation(format!(
                "table '{}' has {} columns but {} values were given",
                table,
                header.len(),
                values.len()
            )));
        }
        Ok(())
    }

    pub fn validate_collection(collection: &str) -> Result<()> {
        if collection.trim().is_empty() {
            return Err(IngestError::Validation(
                "Collection name cannot be empty".to_string(),
            ));
        }

        if collection.len() > MAX_IDENTIFIER_LEN {
            return Err(IngestError::Validation(format!(
                "Collection name too long (max {})",
                MAX_IDENTIFIER_LEN
            )));
        }

        Ok(())
    }

    pub fn validate_file_path(path: &Path) -> Result<()> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            IngestError::Validation(format!(
                "Cannot canonicalize path {}: {}",
                path.display(),
                e
            ))
        })?;

        if !canonical.is_file() {
            return Err(IngestError::Validation(format!(
                "Path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(())
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(IngestError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(IngestError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_size(name: &str, size: u64, max_file_size_mb: usize) -> Result<()> {
        if size == 0 {
            return Err(IngestError::Validation(format!("{} is empty", name)));
        }

        let limit = max_file_size_mb as u64 * 1024 * 1024;
        if size > limit {
            return Err(IngestError::Validation(format!(
                "{} is {} bytes, over the {} MB limit",
                name, size, max_file_size_mb
            )));
        }

        Ok(())
    }

    /// Shortens `text` to at most `max_chars` characters for display.
    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            None => text.to_string(),
            Some((cut, _)) => format!("{}...", &text[..cut]),
        }
    }
}
