// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{IngestError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ingestion: IngestionConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    #[serde(default)]
    pub header_drift: DriftPolicy,
    #[serde(default)]
    pub clear_before_ingest: bool,
    pub max_file_size_mb: usize,
    #[serde(default)]
    pub skip_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    pub default_collection: String,
}

/// What to do when a table is re-ingested with a header that differs from
/// the one it was created with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPolicy {
    #[default]
    Reject,
    Replace,
    Version,
}

impl fmt::Display for DriftPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriftPolicy::Reject => "reject",
            DriftPolicy::Replace => "replace",
            DriftPolicy::Version => "version",
        };
        f.write_str(name)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("BOILER_DOCS")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| IngestError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| IngestError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: PathBuf::from("data/boiler_docs.db"),
                busy_timeout_ms: 5_000,
            },
            ingestion: IngestionConfig {
                header_drift: DriftPolicy::Reject,
                clear_before_ingest: false,
                max_file_size_mb: 25,
                skip_patterns: vec!["~$".to_string(), ".git/".to_string()],
            },
            archive: ArchiveConfig {
                default_collection: "manuals".to_string(),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(IngestError::Config(
                "database.path must not be empty".to_string(),
            ));
        }

        if self.ingestion.max_file_size_mb == 0 {
            return Err(IngestError::Config(
                "max_file_size_mb must be greater than 0".to_string(),
            ));
        }

        if self.archive.default_collection.trim().is_empty() {
            return Err(IngestError::Config(
                "archive.default_collection must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingestion.header_drift, DriftPolicy::Reject);
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        fs::write(
            &path,
            r#"
[database]
path = "store.db"
busy_timeout_ms = 100

[ingestion]
header_drift = "version"
max_file_size_mb = 5

[archive]
default_collection = "inspection_notes"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.database.path, PathBuf::from("store.db"));
        assert_eq!(config.ingestion.header_drift, DriftPolicy::Version);
        assert!(!config.ingestion.clear_before_ingest);
        assert!(config.ingestion.skip_patterns.is_empty());
        assert_eq!(config.archive.default_collection, "inspection_notes");
    }

    #[test]
    fn test_rejects_zero_file_size() {
        let mut config = Config::default_config();
        config.ingestion.max_file_size_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_drift_policy_display() {
        assert_eq!(DriftPolicy::Replace.to_string(), "replace");
    }
}
