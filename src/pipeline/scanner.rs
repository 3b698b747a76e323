// file: src/pipeline/scanner.rs
// description: directory walking and discovery of ingestible documents
// reference: https://docs.rs/walkdir

use crate::config::IngestionConfig;
use crate::error::Result;
use crate::models::DocumentFormat;
use crate::utils::Validator;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub struct FileScanner {
    skip_patterns: Vec<String>,
    max_file_size_mb: usize,
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub format: DocumentFormat,
    pub size: u64,
}

impl FileScanner {
    pub fn new(config: &IngestionConfig) -> Self {
        Self {
            skip_patterns: config.skip_patterns.clone(),
            max_file_size_mb: config.max_file_size_mb,
        }
    }

    /// Finds Word, Excel and PDF files under `root`, sorted by path.
    pub fn scan_directory(&self, root: &Path) -> Result<Vec<ScannedFile>> {
        Validator::validate_directory(root)?;
        info!("Scanning directory: {}", root.display());

        let max_size = self.max_file_size_mb as u64 * 1024 * 1024;
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.should_skip(path) {
                debug!("Skipping file: {}", path.display());
                continue;
            }

            let Some(format) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(DocumentFormat::from_extension)
            else {
                continue;
            };

            let Ok(metadata) = entry.metadata() else {
                continue;
            };

            let size = metadata.len();
            if size == 0 || size > max_size {
                debug!("Skipping file of {} bytes: {}", size, path.display());
                continue;
            }

            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            files.push(ScannedFile {
                path: path.to_path_buf(),
                relative_path,
                format,
                size,
            });
        }

        info!("Found {} ingestible documents", files.len());
        Ok(files)
    }

    /// Patterns are plain substrings of the path; a leading `*.` matches a suffix.
    fn should_skip(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        self.skip_patterns.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*') {
                path_str.ends_with(suffix)
            } else {
                path_str.contains(pattern.as_str())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriftPolicy;
    use std::fs;
    use tempfile::TempDir;

    fn config(skip_patterns: &[&str], max_file_size_mb: usize) -> IngestionConfig {
        IngestionConfig {
            header_drift: DriftPolicy::Reject,
            clear_before_ingest: false,
            max_file_size_mb,
            skip_patterns: skip_patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_scan_finds_supported_formats() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("burners")).unwrap();
        fs::write(temp.path().join("burners/parts.docx"), "x").unwrap();
        fs::write(temp.path().join("stock.XLSX"), "x").unwrap();
        fs::write(temp.path().join("manual.pdf"), "x").unwrap();
        fs::write(temp.path().join("notes.txt"), "x").unwrap();
        fs::write(temp.path().join("empty.pdf"), "").unwrap();

        let files = FileScanner::new(&config(&[], 10))
            .scan_directory(temp.path())
            .unwrap();

        let found: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(found.len(), 3);
        assert!(found.contains(&"manual.pdf"));
        assert!(files.iter().any(|f| f.format == DocumentFormat::Xlsx));
    }

    #[test]
    fn test_skip_patterns() {
        let scanner = FileScanner::new(&config(&["~$", "*.bak.docx", ".git/"], 10));

        assert!(scanner.should_skip(Path::new("dir/~$parts.docx")));
        assert!(scanner.should_skip(Path::new("old.bak.docx")));
        assert!(scanner.should_skip(Path::new("repo/.git/x.pdf")));
        assert!(!scanner.should_skip(Path::new("parts.docx")));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let scanner = FileScanner::new(&config(&[], 10));
        assert!(scanner.scan_directory(Path::new("/nonexistent/dir")).is_err());
    }
}
