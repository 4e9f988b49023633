//! Server configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use airq_store::backend::DEFAULT_PAGE_SIZE;
use airq_store::{ClassificationTable, MemoryRangeStore, TableError, TelemetryStore};
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Classification table settings.
    pub classification: ClassificationConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Storage path is not empty for the SQLite backend
    /// - Page size is within 1..=10000
    /// - Classification path, if set, is not empty
    ///
    /// # Example
    ///
    /// ```
    /// use airq_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.classification.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
            return errors;
        }

        let Some((_, port)) = self.bind.rsplit_once(':') else {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            });
            return errors;
        };

        match port.parse::<u16>() {
            Ok(0) => errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "port cannot be 0".to_string(),
            }),
            Err(_) => errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: format!("invalid port '{}': must be a number 1-65535", port),
            }),
            Ok(_) => {}
        }

        errors
    }
}

/// Which range store backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    /// Nothing survives a restart.
    Memory,
}

/// Minimum page size.
pub const MIN_PAGE_SIZE: usize = 1;
/// Maximum page size.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    /// Database file path (SQLite only).
    pub path: PathBuf,
    /// Maximum items per backend read.
    pub page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            path: airq_store::default_db_path(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.backend == Backend::Sqlite && self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            errors.push(ValidationError {
                field: "storage.page_size".to_string(),
                message: format!(
                    "page size {} is out of range ({}-{})",
                    self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
                ),
            });
        }

        errors
    }

    /// Open the configured backend.
    pub fn open(&self, classification: Arc<ClassificationTable>) -> airq_store::Result<TelemetryStore> {
        match self.backend {
            Backend::Sqlite => TelemetryStore::open(&self.path, self.page_size, classification),
            Backend::Memory => Ok(TelemetryStore::new(
                Arc::new(MemoryRangeStore::with_page_size(self.page_size)),
                classification,
            )),
        }
    }
}

/// Classification table configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Table file (`.toml` or `.json`); the built-in table when unset.
    pub path: Option<PathBuf>,
}

impl ClassificationConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(path) = &self.path
            && path.as_os_str().is_empty()
        {
            errors.push(ValidationError {
                field: "classification.path".to_string(),
                message: "table path cannot be empty (omit it for the built-in table)"
                    .to_string(),
            });
        }
        errors
    }

    /// Load the configured table.
    pub fn load_table(&self) -> Result<ClassificationTable, TableError> {
        match &self.path {
            Some(path) => ClassificationTable::load(path),
            None => Ok(ClassificationTable::builtin()),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `storage.page_size`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("airq")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.storage.backend, Backend::Sqlite);
        assert_eq!(config.storage.page_size, 100);
        assert_eq!(config.storage.path, airq_store::default_db_path());
        assert!(config.classification.path.is_none());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let config = Config {
            server: ServerConfig {
                bind: "127.0.0.1:9090".to_string(),
            },
            storage: StorageConfig {
                backend: Backend::Memory,
                path: PathBuf::from("/tmp/test.db"),
                page_size: 25,
            },
            classification: ClassificationConfig {
                path: Some(PathBuf::from("/etc/airq/table.toml")),
            },
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "127.0.0.1:9090");
        assert_eq!(loaded.storage.backend, Backend::Memory);
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(loaded.storage.page_size, 25);
        assert_eq!(
            loaded.classification.path,
            Some(PathBuf::from("/etc/airq/table.toml"))
        );
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_partial_toml() {
        let toml = r#"
            [storage]
            backend = "memory"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.storage.backend, Backend::Memory);
        assert_eq!(config.storage.page_size, 100);
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("airq/server.toml"));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_server_bind_validation() {
        for bind in ["127.0.0.1:8080", "[::1]:8080", "localhost:5000"] {
            let valid = ServerConfig {
                bind: bind.to_string(),
            };
            assert!(valid.validate().is_empty(), "{bind} should be valid");
        }

        let cases = [
            ("", "cannot be empty"),
            ("127.0.0.1", "host:port"),
            ("127.0.0.1:0", "cannot be 0"),
            ("127.0.0.1:abc", "must be a number"),
        ];
        for (bind, expected) in cases {
            let errors = ServerConfig {
                bind: bind.to_string(),
            }
            .validate();
            assert_eq!(errors.len(), 1, "{bind}");
            assert!(errors[0].message.contains(expected), "{bind}");
        }
    }

    #[test]
    fn test_storage_validation() {
        let empty_path = StorageConfig {
            path: PathBuf::new(),
            ..StorageConfig::default()
        };
        let errors = empty_path.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "storage.path");

        // Memory backends ignore the path.
        let memory = StorageConfig {
            backend: Backend::Memory,
            path: PathBuf::new(),
            ..StorageConfig::default()
        };
        assert!(memory.validate().is_empty());

        for page_size in [0, 10_001] {
            let errors = StorageConfig {
                page_size,
                ..StorageConfig::default()
            }
            .validate();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, "storage.page_size");
        }
    }

    #[test]
    fn test_classification_validation() {
        let empty = ClassificationConfig {
            path: Some(PathBuf::new()),
        };
        assert_eq!(empty.validate().len(), 1);
        assert!(ClassificationConfig::default().validate().is_empty());
    }

    #[test]
    fn test_classification_load_table() {
        let builtin = ClassificationConfig::default().load_table().unwrap();
        assert!(!builtin.bands(airq_types::Pollutant::Pm25).is_empty());

        let missing = ClassificationConfig {
            path: Some(PathBuf::from("/nonexistent/table.toml")),
        };
        assert!(matches!(missing.load_table(), Err(TableError::Read { .. })));
    }

    #[test]
    fn test_storage_open_memory() {
        let storage = StorageConfig {
            backend: Backend::Memory,
            ..StorageConfig::default()
        };
        let store = storage
            .open(Arc::new(ClassificationTable::builtin()))
            .unwrap();
        assert!(store.list_device_ids().unwrap().is_empty());
    }

    #[test]
    fn test_storage_open_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            path: temp_dir.path().join("telemetry.db"),
            ..StorageConfig::default()
        };
        let store = storage
            .open(Arc::new(ClassificationTable::builtin()))
            .unwrap();
        assert!(store.list_device_ids().unwrap().is_empty());
        assert!(temp_dir.path().join("telemetry.db").exists());
    }

    #[test]
    fn test_config_validation_error_display() {
        let errors = vec![
            ValidationError {
                field: "server.bind".to_string(),
                message: "port cannot be 0".to_string(),
            },
            ValidationError {
                field: "storage.page_size".to_string(),
                message: "page size 0 is out of range (1-10000)".to_string(),
            },
        ];
        let display = ConfigError::Validation(errors).to_string();
        assert!(display.contains("server.bind"));
        assert!(display.contains("storage.page_size"));
    }
}
