// file: src/database/archive.rs
// description: binary archive of uploaded files grouped by collection
// reference: https://www.sqlite.org/datatype3.html

use crate::database::client::SqliteClient;
use crate::error::{IngestError, Result};
use crate::models::{Document, StoredFile};
use crate::utils::Validator;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::{debug, info};

const OCTET_STREAM: &str = "application/octet-stream";

const METADATA_COLUMNS: &str =
    "id, collection, file_name, content_type, sha256, size, uploaded_at";

pub struct FileArchive<'a> {
    client: &'a SqliteClient,
}

impl<'a> FileArchive<'a> {
    pub fn new(client: &'a SqliteClient) -> Self {
        Self { client }
    }

    pub fn save(&self, collection: &str, document: &Document) -> Result<StoredFile> {
        Validator::validate_collection(collection)?;

        let content_type = document
            .format
            .map(|f| f.content_type())
            .unwrap_or(OCTET_STREAM);
        let uploaded_at = Utc::now();

        self.client.connection().execute(
            "INSERT INTO __stored_files
                (collection, file_name, content_type, sha256, size, uploaded_at, file_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                collection,
                document.name,
                content_type,
                document.content_hash,
                document.size() as i64,
                uploaded_at,
                document.bytes,
            ],
        )?;

        let id = self.client.connection().last_insert_rowid();
        info!(
            "Archived {} ({} bytes) in '{}' as #{}",
            document.name,
            document.size(),
            collection,
            id
        );

        Ok(StoredFile {
            id,
            collection: collection.to_string(),
            file_name: document.name.clone(),
            content_type: content_type.to_string(),
            sha256: document.content_hash.clone(),
            size: document.size(),
            uploaded_at,
        })
    }

    /// Metadata of archived files, oldest first, optionally for one collection.
    pub fn list(&self, collection: Option<&str>) -> Result<Vec<StoredFile>> {
        let connection = self.client.connection();

        let files = match collection {
            Some(collection) => {
                let mut stmt = connection.prepare(&format!(
                    "SELECT {} FROM __stored_files WHERE collection = ?1 ORDER BY id",
                    METADATA_COLUMNS
                ))?;
                stmt.query_map(params![collection], stored_file_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = connection.prepare(&format!(
                    "SELECT {} FROM __stored_files ORDER BY id",
                    METADATA_COLUMNS
                ))?;
                stmt.query_map([], stored_file_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(files)
    }

    pub fn load(&self, id: i64) -> Result<(StoredFile, Vec<u8>)> {
        let found = self
            .client
            .connection()
            .query_row(
                &format!(
                    "SELECT {}, file_data FROM __stored_files WHERE id = ?1",
                    METADATA_COLUMNS
                ),
                params![id],
                |row| Ok((stored_file_from_row(row)?, row.get::<_, Vec<u8>>(7)?)),
            )
            .optional()?;

        found.ok_or_else(|| IngestError::NotFound(format!("stored file #{}", id)))
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let removed = self
            .client
            .connection()
            .execute("DELETE FROM __stored_files WHERE id = ?1", params![id])?;

        debug!("Delete stored file #{}: {} rows", id, removed);
        Ok(removed > 0)
    }

    pub fn find_by_hash(&self, collection: &str, sha256: &str) -> Result<Option<StoredFile>> {
        let found = self
            .client
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM __stored_files
                     WHERE collection = ?1 AND sha256 = ?2 ORDER BY id LIMIT 1",
                    METADATA_COLUMNS
                ),
                params![collection, sha256],
                stored_file_from_row,
            )
            .optional()?;

        Ok(found)
    }
}

fn stored_file_from_row(row: &Row<'_>) -> rusqlite::Result<StoredFile> {
    Ok(StoredFile {
        id: row.get(0)?,
        collection: row.get(1)?,
        file_name: row.get(2)?,
        content_type: row.get(3)?,
        sha256: row.get(4)?,
        size: row.get::<_, i64>(5)? as u64,
        uploaded_at: row.get::<_, DateTime<Utc>>(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_save_load_round_trip() {
        let client = SqliteClient::open_in_memory().unwrap();
        let archive = FileArchive::new(&client);
        let doc = Document::new("manual.pdf", b"%PDF-1.7 burner manual".to_vec());

        let saved = archive.save("manuals", &doc).unwrap();
        assert_eq!(saved.content_type, "application/pdf");

        let (meta, bytes) = archive.load(saved.id).unwrap();
        assert_eq!(meta.id, saved.id);
        assert_eq!(meta.file_name, "manual.pdf");
        assert_eq!(meta.sha256, doc.content_hash);
        assert_eq!(meta.size, doc.size());
        assert_eq!(bytes, doc.bytes);
    }

    #[test]
    fn test_unknown_format_is_octet_stream() {
        let client = SqliteClient::open_in_memory().unwrap();
        let saved = FileArchive::new(&client)
            .save("notes", &Document::new("notes.txt", b"check valve".to_vec()))
            .unwrap();
        assert_eq!(saved.content_type, OCTET_STREAM);
    }

    #[test]
    fn test_list_filters_by_collection() {
        let client = SqliteClient::open_in_memory().unwrap();
        let archive = FileArchive::new(&client);
        archive.save("manuals", &Document::new("a.pdf", b"%PDF a".to_vec())).unwrap();
        archive.save("inspections", &Document::new("b.pdf", b"%PDF b".to_vec())).unwrap();
        archive.save("manuals", &Document::new("c.pdf", b"%PDF c".to_vec())).unwrap();

        let names: Vec<String> = archive
            .list(Some("manuals"))
            .unwrap()
            .into_iter()
            .map(|f| f.file_name)
            .collect();
        assert_eq!(names, vec!["a.pdf", "c.pdf"]);
        assert_eq!(archive.list(None).unwrap().len(), 3);
    }

    #[test]
    fn test_delete_and_missing_load() {
        let client = SqliteClient::open_in_memory().unwrap();
        let archive = FileArchive::new(&client);
        let saved = archive.save("manuals", &Document::new("a.pdf", b"%PDF".to_vec())).unwrap();

        assert!(archive.delete(saved.id).unwrap());
        assert!(!archive.delete(saved.id).unwrap());
        assert!(archive.load(saved.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_find_by_hash() {
        let client = SqliteClient::open_in_memory().unwrap();
        let archive = FileArchive::new(&client);
        let doc = Document::new("a.pdf", b"%PDF same".to_vec());
        let saved = archive.save("manuals", &doc).unwrap();

        assert_eq!(
            archive.find_by_hash("manuals", &doc.content_hash).unwrap().map(|f| f.id),
            Some(saved.id)
        );
        assert!(archive.find_by_hash("other", &doc.content_hash).unwrap().is_none());
    }

    #[test]
    fn test_rejects_blank_collection() {
        let client = SqliteClient::open_in_memory().unwrap();
        let result = FileArchive::new(&client).save(" ", &Document::new("a.pdf", b"%PDF".to_vec()));
        assert!(result.is_err());
    }
}
