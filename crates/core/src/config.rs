//! Lab checker configuration via `labcheck.toml`
//!
//! A missing file means defaults. `labcheck` writes a commented default file
//! next to the data directory on first use; edit it and rerun.
//!
//! By default the labs run against a MongoDB server at [`DEFAULT_URI`]. The
//! `memory` backend runs them against the embedded store instead, persisted
//! in `data_file`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "labcheck.toml";

/// Default location of the store snapshot.
pub const DEFAULT_DATA_FILE: &str = ".labcheck/store.json";

/// Default MongoDB connection string.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Default database the course collections live in.
pub const DEFAULT_DATABASE: &str = "labcheck";

/// Log levels accepted in `log_level`.
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Which store the seeder and the labs run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// A MongoDB server reached through `uri`
    #[default]
    Mongodb,
    /// The embedded store, persisted in `data_file`
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mongodb" => Ok(StoreBackend::Mongodb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(Error::Config(format!(
                "Invalid store '{}'. Expected one of: mongodb, memory",
                other
            ))),
        }
    }
}

/// Configuration loaded from `labcheck.toml`.
///
/// # Example
///
/// ```toml
/// store = "mongodb"
/// uri = "mongodb://localhost:27017/?replicaSet=rs0"
/// database = "labcheck"
/// data_file = ".labcheck/store.json"
/// log_level = "warn"
/// truncate_at = 80
/// labs = ["Lab 1 CRUD", "Lab 4 Indexes"]
/// reseed_before_validate = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabcheckConfig {
    /// Store backend.
    #[serde(default)]
    pub store: StoreBackend,
    /// MongoDB connection string (`mongodb` backend).
    #[serde(default = "default_uri")]
    pub uri: String,
    /// Database holding the course collections (`mongodb` backend).
    #[serde(default = "default_database")]
    pub database: String,
    /// Path of the JSON snapshot the store loads and flushes (`memory` backend).
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Fallback log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Maximum characters of command text kept in a failure record.
    #[serde(default = "default_truncate_at")]
    pub truncate_at: usize,
    /// Labs to run; empty runs every lab.
    #[serde(default)]
    pub labs: Vec<String>,
    /// Seed the course dataset before every `validate`.
    #[serde(default)]
    pub reseed_before_validate: bool,
}

fn default_uri() -> String {
    DEFAULT_URI.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_data_file() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_FILE)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_truncate_at() -> usize {
    80
}

impl Default for LabcheckConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::default(),
            uri: default_uri(),
            database: default_database(),
            data_file: default_data_file(),
            log_level: default_log_level(),
            truncate_at: default_truncate_at(),
            labs: Vec::new(),
            reseed_before_validate: false,
        }
    }
}

impl LabcheckConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# labcheck configuration
#
# Store to seed and validate: "mongodb" (a running server) or "memory"
# (the embedded store, saved to data_file between commands).
store = "mongodb"

# Connection string and database for the mongodb store. The transactions
# lab needs a replica set, e.g. "mongodb://localhost:27017/?replicaSet=rs0".
uri = "mongodb://localhost:27017"
database = "labcheck"

# Snapshot file shared by `labcheck seed` and `labcheck validate` (memory store).
data_file = ".labcheck/store.json"

# Log filter used when RUST_LOG is unset: error, warn, info, debug or trace.
log_level = "warn"

# Command text longer than this is truncated in the failure list.
truncate_at = 80

# Restrict validation to these labs (empty = all), e.g.
# labs = ["Lab 1 CRUD", "Lab 5 Geospatial & Text"]
labs = []

# Re-seed the built-in course dataset before every validate run.
reseed_before_validate = false
"#
    }

    /// Check field values that serde alone cannot reject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown log level, a zero truncation
    /// width or an empty database name.
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(Error::Config(format!(
                "Invalid log_level '{}'. Expected one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        if self.truncate_at == 0 {
            return Err(Error::Config("truncate_at must be at least 1".to_string()));
        }
        if self.database.is_empty() {
            return Err(Error::Config("database must not be empty".to_string()));
        }
        Ok(())
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: LabcheckConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_toml_parses_to_default() {
        let parsed: LabcheckConfig = toml::from_str(LabcheckConfig::default_toml()).unwrap();
        assert_eq!(parsed, LabcheckConfig::default());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let parsed: LabcheckConfig = toml::from_str("").unwrap();
        assert_eq!(parsed.truncate_at, 80);
        assert_eq!(parsed.data_file, PathBuf::from(DEFAULT_DATA_FILE));
    }

    #[test]
    fn test_from_file_rejects_bad_log_level() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "log_level = \"loud\"\n").unwrap();
        let err = LabcheckConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid log_level"));
    }

    #[test]
    fn test_from_file_rejects_zero_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "truncate_at = 0\n").unwrap();
        assert!(LabcheckConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_write_default_if_missing_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "truncate_at = 40\n").unwrap();
        LabcheckConfig::write_default_if_missing(&path).unwrap();
        assert_eq!(LabcheckConfig::from_file(&path).unwrap().truncate_at, 40);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = LabcheckConfig::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, LabcheckConfig::default());
    }

    #[test]
    fn test_store_backend_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "store = \"memory\"\n").unwrap();
        let config = LabcheckConfig::from_file(&path).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.uri, DEFAULT_URI);

        std::fs::write(&path, "store = \"postgres\"\n").unwrap();
        assert!(LabcheckConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_store_backend_from_str() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("mongodb".parse::<StoreBackend>().unwrap(), StoreBackend::Mongodb);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_empty_database_rejected() {
        let config = LabcheckConfig {
            database: String::new(),
            ..LabcheckConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
