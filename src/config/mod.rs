//! Configuration module for triage.

use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a triage server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Persistence configuration.
    pub storage: StorageConfig,
    /// Model artifact configuration.
    pub artifact: ArtifactConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl TriageConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TriageError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            TriageError::Config(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.path.as_os_str().is_empty() {
            return Err(TriageError::InvalidConfig {
                field: "storage.path".to_string(),
                reason: "Storage path must not be empty".to_string(),
            });
        }

        if self.artifact.path.as_os_str().is_empty() {
            return Err(TriageError::InvalidConfig {
                field: "artifact.path".to_string(),
                reason: "Artifact path must not be empty".to_string(),
            });
        }

        if self.server.shutdown_timeout.is_zero() {
            return Err(TriageError::InvalidConfig {
                field: "server.shutdown_timeout".to_string(),
                reason: "Shutdown timeout must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    /// Create a local development configuration.
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "127.0.0.1:8000".parse().expect("valid socket address"),
                shutdown_timeout: Duration::from_secs(5),
            },
            storage: StorageConfig {
                path: PathBuf::from("Health_Risk.db"),
            },
            artifact: ArtifactConfig {
                path: PathBuf::from("health_risk_complete.json"),
                unknown_category: UnknownCategoryPolicy::Missing,
                decode_target: false,
            },
            observability: ObservabilityConfig {
                log_level: "debug".to_string(),
                json_logs: false,
            },
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP server.
    pub bind_addr: SocketAddr,
    /// Time allowed for in-flight requests to drain on shutdown.
    #[serde(with = "duration_str")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".parse().expect("valid socket address"),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Health_Risk.db"),
        }
    }
}

/// Model artifact configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Serialized bundle path.
    pub path: PathBuf,
    /// What to do with a category value the encoders have never seen.
    #[serde(default)]
    pub unknown_category: UnknownCategoryPolicy,
    /// Map integer class labels back through the `target` encoder.
    #[serde(default)]
    pub decode_target: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("health_risk_complete.json"),
            unknown_category: UnknownCategoryPolicy::default(),
            decode_target: false,
        }
    }
}

/// Handling of category values absent from an encoder mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCategoryPolicy {
    /// Carry a NaN marker; the model refuses to score it.
    #[default]
    Missing,
    /// Fill the column with zero and log a warning.
    Zero,
    /// Fail the request.
    Reject,
}

impl std::str::FromStr for UnknownCategoryPolicy {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "missing" => Ok(UnknownCategoryPolicy::Missing),
            "zero" => Ok(UnknownCategoryPolicy::Zero),
            "reject" => Ok(UnknownCategoryPolicy::Reject),
            other => Err(TriageError::InvalidConfig {
                field: "artifact.unknown_category".to_string(),
                reason: format!("unknown policy '{}', expected missing, zero or reject", other),
            }),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for durations written as `"250ms"` or `"1.5s"`.
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let (number, seconds_per_unit) = if let Some(n) = s.strip_suffix("ms") {
            (n, 0.001)
        } else if let Some(n) = s.strip_suffix('s') {
            (n, 1.0)
        } else {
            return Err(format!("duration '{}' needs an 'ms' or 's' suffix", s));
        };

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| format!("invalid duration '{}'", s))?;
        Duration::try_from_secs_f64(value * seconds_per_unit)
            .map_err(|e| format!("invalid duration '{}': {}", s, e))
    }
}
