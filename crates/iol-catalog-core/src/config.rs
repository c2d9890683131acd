//! Core configuration, loaded from TOML.
//!
//! ```toml
//! [storage]
//! database_path = "iol-catalog.db"
//!
//! [logging]
//! filter = "iol_catalog_core=info"
//!
//! [rules]
//! table_path = "rules.json"
//! legacy_format = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RulesConfig {
    /// Rule table JSON file; no recommendations until one is loaded
    #[serde(default)]
    pub table_path: Option<PathBuf>,

    /// Table uses the combined required/negated tag list schema
    #[serde(default)]
    pub legacy_format: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("iol-catalog.db")
}

fn default_log_filter() -> String {
    "iol_catalog_core=info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl CoreConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid core configuration")
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        // Relative paths are relative to the config file
        if let Some(dir) = path.parent() {
            config.resolve_relative_to(dir);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        if self.storage.database_path.is_relative() {
            self.storage.database_path = dir.join(&self.storage.database_path);
        }
        if let Some(table_path) = self.rules.table_path.as_mut() {
            if table_path.is_relative() {
                *table_path = dir.join(&*table_path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CoreConfig::from_toml("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.logging.filter, "iol_catalog_core=info");
        assert!(!config.rules.legacy_format);
    }

    #[test]
    fn test_partial_config() {
        let config = CoreConfig::from_toml(
            r#"
            [rules]
            table_path = "/etc/iol/rules.json"
            legacy_format = true
            "#,
        )
        .unwrap();
        assert_eq!(config.rules.table_path, Some(PathBuf::from("/etc/iol/rules.json")));
        assert!(config.rules.legacy_format);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        assert!(CoreConfig::from_toml("[rules]\nlegacy_format = \"maybe\"").is_err());
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[storage]\ndatabase_path = \"data/catalog.db\"").unwrap();
        writeln!(file, "[rules]\ntable_path = \"rules.json\"").unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.storage.database_path, dir.path().join("data/catalog.db"));
        assert_eq!(config.rules.table_path, Some(dir.path().join("rules.json")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CoreConfig::load("/nonexistent/core.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
