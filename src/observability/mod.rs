//! Logging for the triage service.
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::ObservabilityConfig;
use crate::error::{Result, TriageError};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. Fails if one is already installed.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TriageError::InvalidConfig {
            field: "observability.log_level".to_string(),
            reason: e.to_string(),
        })?;

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| TriageError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| TriageError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!(level = %config.log_level, json = config.json_logs, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = ObservabilityConfig::default();
        // Another test may have installed a subscriber already; either way the
        // second call cannot succeed.
        let _ = init(&config);
        assert!(matches!(init(&config), Err(TriageError::Internal(_))));
    }

    #[test]
    fn test_bad_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = ObservabilityConfig {
            log_level: "triage=loud".to_string(),
            json_logs: false,
        };
        assert!(matches!(
            init(&config),
            Err(TriageError::InvalidConfig { .. })
        ));
    }
}
