//! Sampler configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use airq_types::RESERVED_DEVICE_ID;
use serde::{Deserialize, Serialize};

/// Minimum sampling interval in seconds.
pub const MIN_INTERVAL_SECS: u64 = 1;
/// Maximum sampling interval in seconds (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Sampler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// ID the readings are stored under. Must be changed from the default.
    pub device_id: String,
    /// Serial device the sensor is attached to.
    pub port: String,
    pub baud_rate: u32,
    /// URL readings are POSTed to.
    pub endpoint: String,
    /// Seconds between samples.
    pub interval_secs: u64,
    /// Serial read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            device_id: RESERVED_DEVICE_ID.to_string(),
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            endpoint: "http://air.local:5000/data".to_string(),
            interval_secs: 300,
            read_timeout_secs: 2,
        }
    }
}

impl SamplerConfig {
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
    /// The reserved device ID is allowed here: the server rejects its
    /// readings, and the sampler warns about it at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: String| {
            if !ok {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message,
                });
            }
        };

        check(
            !self.device_id.is_empty(),
            "device_id",
            "device ID cannot be empty".to_string(),
        );
        check(
            !self.port.is_empty(),
            "port",
            "serial port cannot be empty".to_string(),
        );
        check(
            self.baud_rate > 0,
            "baud_rate",
            "baud rate must be positive".to_string(),
        );
        check(
            self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://"),
            "endpoint",
            format!(
                "endpoint '{}' must start with http:// or https://",
                self.endpoint
            ),
        );
        check(
            (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&self.interval_secs),
            "interval_secs",
            format!(
                "interval {} is out of range ({}-{} seconds)",
                self.interval_secs, MIN_INTERVAL_SECS, MAX_INTERVAL_SECS
            ),
        );
        check(
            self.read_timeout_secs > 0,
            "read_timeout_secs",
            "read timeout must be positive".to_string(),
        );

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

    /// Whether the device ID is still the reserved placeholder.
    pub fn uses_reserved_device_id(&self) -> bool {
        self.device_id == RESERVED_DEVICE_ID
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
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
    pub field: String,
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
        .join("sampler.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SamplerConfig::default();
        assert_eq!(config.device_id, "default_device");
        assert!(config.uses_reserved_device_id());
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.endpoint, "http://air.local:5000/data");
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(SamplerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: SamplerConfig = toml::from_str(
            r#"
            device_id = "office"
            interval_secs = 60
        "#,
        )
        .unwrap();
        assert_eq!(config.device_id, "office");
        assert!(!config.uses_reserved_device_id());
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("sampler.toml");

        let config = SamplerConfig {
            device_id: "office".to_string(),
            port: "/dev/ttyAMA0".to_string(),
            endpoint: "https://air.example.com/data".to_string(),
            ..SamplerConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(SamplerConfig::load_validated(&path).unwrap(), config);
    }

    #[test]
    fn test_config_load_errors() {
        assert!(matches!(
            SamplerConfig::load("/nonexistent/sampler.toml"),
            Err(ConfigError::Read { .. })
        ));

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "interval_secs = \"soon\"").unwrap();
        assert!(matches!(
            SamplerConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validation_collects_every_error() {
        let config = SamplerConfig {
            device_id: String::new(),
            port: String::new(),
            baud_rate: 0,
            endpoint: "air.local:5000/data".to_string(),
            interval_secs: 0,
            read_timeout_secs: 0,
        };

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "device_id",
                "port",
                "baud_rate",
                "endpoint",
                "interval_secs",
                "read_timeout_secs"
            ]
        );
    }

    #[test]
    fn test_interval_upper_bound() {
        let config = SamplerConfig {
            interval_secs: MAX_INTERVAL_SECS + 1,
            ..SamplerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("airq/sampler.toml"));
    }
}
