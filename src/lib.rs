//! Triage - A health-risk prediction service.
//!
//! Triage serves predictions from a pre-trained tabular classifier over HTTP and
//! records every submission and every prediction in SQLite.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  HTTP: GET /  |  POST /predict  |  GET /health              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Prediction Service: audit -> transform -> score -> record  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Feature Transformer: encode | one-hot | reindex | scale    │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  Artifact Bundle (read-only) │  Prediction Store (SQLite)   │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use triage::config::TriageConfig;
//!
//! #[tokio::main]
//! async fn main() -> triage::Result<()> {
//!     let config = TriageConfig::development();
//!     triage::run(config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod artifact;
pub mod storage;
pub mod transform;
pub mod service;

pub mod api;
pub mod health;
pub mod server;
pub mod shutdown;

pub mod cli;
pub mod observability;

// Re-exports
pub use error::{Result, TriageError};
pub use types::*;

use config::TriageConfig;
use server::Server;
use shutdown::{ShutdownCoordinator, SignalHandler};
use tokio::net::TcpListener;
use tracing::info;

/// Crate version reported by `/health` and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the triage server with the given configuration.
///
/// Returns once a shutdown signal has been handled. Artifact or storage
/// failures abort before the listener is bound.
pub async fn run(config: TriageConfig) -> Result<()> {
    config.validate()?;
    observability::init(&config.observability)?;
    info!(version = VERSION, "Starting triage");

    let server = Server::initialize(&config)?;

    let listener = TcpListener::bind(config.server.bind_addr).await?;
    let coordinator = ShutdownCoordinator::with_timeout(config.server.shutdown_timeout);

    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        SignalHandler::new(signal_coordinator).run().await;
    });

    server.serve(listener, coordinator).await?;

    info!("Triage shutdown complete");
    Ok(())
}
