//! Command-line interface for triage.

use crate::config::{TriageConfig, UnknownCategoryPolicy};
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Triage - HTTP prediction service for a pre-trained health-risk classifier.
#[derive(Debug, Parser)]
#[command(name = "triage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (JSON)
    #[arg(short, long, global = true, env = "TRIAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "TRIAGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the prediction server
    Serve {
        /// Bind address for the HTTP server
        #[arg(long, env = "TRIAGE_BIND_ADDR")]
        bind_addr: Option<SocketAddr>,

        /// SQLite database file
        #[arg(long, env = "TRIAGE_STORAGE_PATH")]
        storage_path: Option<PathBuf>,

        /// Model artifact bundle
        #[arg(long, env = "TRIAGE_ARTIFACT_PATH")]
        artifact_path: Option<PathBuf>,

        /// Handling of unknown categories (missing, zero, reject)
        #[arg(long)]
        unknown_category: Option<UnknownCategoryPolicy>,
    },

    /// Load and validate a model artifact bundle
    Check {
        /// Bundle path; defaults to the configured artifact
        #[arg(long, env = "TRIAGE_ARTIFACT_PATH")]
        artifact: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Base configuration from `--config`, or defaults, with global flags applied.
    pub fn base_config(&self) -> Result<TriageConfig> {
        let mut config = match &self.config {
            Some(path) => TriageConfig::from_file(path)?,
            None => TriageConfig::default(),
        };

        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }

        Ok(config)
    }

    /// Full server configuration: file, then environment and flags.
    pub fn serve_config(&self) -> Result<TriageConfig> {
        let mut config = self.base_config()?;

        if let Commands::Serve {
            bind_addr,
            storage_path,
            artifact_path,
            unknown_category,
        } = &self.command
        {
            if let Some(addr) = bind_addr {
                config.server.bind_addr = *addr;
            }
            if let Some(path) = storage_path {
                config.storage.path = path.clone();
            }
            if let Some(path) = artifact_path {
                config.artifact.path = path.clone();
            }
            if let Some(policy) = unknown_category {
                config.artifact.unknown_category = *policy;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "triage",
            "serve",
            "--bind-addr",
            "127.0.0.1:9100",
            "--storage-path",
            "/tmp/risk.db",
            "--unknown-category",
            "reject",
            "--log-level",
            "warn",
        ])
        .unwrap();

        let config = cli.serve_config().unwrap();
        assert_eq!(config.server.bind_addr.port(), 9100);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/risk.db"));
        assert_eq!(config.artifact.unknown_category, UnknownCategoryPolicy::Reject);
        assert_eq!(config.observability.log_level, "warn");
    }

    #[test]
    fn test_bad_policy_rejected() {
        let result = Cli::try_parse_from(["triage", "serve", "--unknown-category", "guess"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_command() {
        let cli = Cli::try_parse_from(["triage", "check", "--artifact", "bundle.json"]).unwrap();
        match cli.command {
            Commands::Check { artifact } => {
                assert_eq!(artifact, Some(PathBuf::from("bundle.json")))
            }
            other => panic!("expected check, got {:?}", other),
        }
    }
}
