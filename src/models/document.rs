// file: src/models/document.rs
// description: uploaded document model with format detection and content hashing
// reference: internal data structures

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;
use std::path::Path;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Docx,
    Xlsx,
    Pdf,
}

impl DocumentFormat {
    /// Sniffs the container from its leading bytes, then falls back to the
    /// declared file extension.
    pub fn detect(name: &str, bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PDF_MAGIC) {
            return Some(Self::Pdf);
        }

        if bytes.starts_with(ZIP_MAGIC)
            && let Some(format) = Self::sniff_office_zip(bytes)
        {
            return Some(format);
        }

        Self::from_extension(name)
    }

    pub fn from_extension(name: &str) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();

        match extension.as_str() {
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Pdf => "application/pdf",
        }
    }

    fn sniff_office_zip(bytes: &[u8]) -> Option<Self> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
        let mut names = archive.file_names();

        names.find_map(|name| match name {
            "word/document.xml" => Some(Self::Docx),
            "xl/workbook.xml" => Some(Self::Xlsx),
            _ => None,
        })
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
        };
        f.write_str(name)
    }
}

/// Raw upload held only for the duration of extraction.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_hash: String,
    pub format: Option<DocumentFormat>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_hash = Self::compute_hash(&bytes);
        let format = DocumentFormat::detect(&name, &bytes);

        Self {
            name,
            bytes,
            content_hash,
            format,
        }
    }

    pub fn compute_hash(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// File name without directories or extension.
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_with(entry: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file(entry, options).unwrap();
        writer.write_all(b"<x/>").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_detect_by_magic() {
        assert_eq!(
            DocumentFormat::detect("scan.bin", b"%PDF-1.7\n"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::detect("upload", &zip_with("word/document.xml")),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(
            DocumentFormat::detect("upload", &zip_with("xl/workbook.xml")),
            Some(DocumentFormat::Xlsx)
        );
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            DocumentFormat::detect("Parts.XLSX", b"not a zip"),
            Some(DocumentFormat::Xlsx)
        );
        assert_eq!(DocumentFormat::detect("notes.txt", b"plain"), None);
    }

    #[test]
    fn test_document_hash_and_stem() {
        let doc = Document::new("manuals/burner guide.pdf", b"%PDF-1.4".to_vec());

        assert_eq!(doc.stem(), "burner guide");
        assert_eq!(doc.size(), 8);
        assert_eq!(doc.content_hash.len(), 64);
        assert_eq!(doc.content_hash, Document::compute_hash(b"%PDF-1.4"));
    }
}
