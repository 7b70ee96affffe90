//! Error types for the triage prediction service.
//!
//! This module provides a unified error type [`TriageError`] for all triage operations,
//! along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Startup**: the artifact bundle or the storage schema could not be prepared.
//!   These are fatal; the server never starts accepting traffic.
//! - **Persistence**: a row could not be appended to one of the record streams.
//! - **Request**: the caller sent something that cannot be processed.
//! - **Configuration**: invalid settings or missing configuration.
//!
//! # Example
//!
//! ```rust
//! use triage::error::{Result, TriageError};
//!
//! fn check_width(expected: usize, got: usize) -> Result<()> {
//!     if expected != got {
//!         return Err(TriageError::ArtifactLoad(format!(
//!             "scaler expects {} columns, feature order has {}",
//!             got, expected
//!         )));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_width(12, 11).unwrap_err();
//! assert!(err.is_fatal_at_startup());
//! ```

use crate::types::FieldError;
use std::io;
use thiserror::Error;

/// Main error type for triage operations.
#[derive(Error, Debug)]
pub enum TriageError {
    // Startup errors
    #[error("Artifact load failed: {0}")]
    ArtifactLoad(String),

    #[error("Persistence init failed: {0}")]
    PersistenceInit(String),

    // Persistence errors
    #[error("Persistence write to {stream} failed: {reason}")]
    PersistenceWrite { stream: String, reason: String },

    #[error("Persistence read failed: {0}")]
    PersistenceRead(String),

    // Request errors
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Unknown category {value:?} for column {column}")]
    UnknownCategory { column: String, value: String },

    #[error("Scoring failed: {0}")]
    Scoring(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TriageError {
    /// Whether the process must refuse to start when this error occurs during initialisation.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            TriageError::ArtifactLoad(_)
                | TriageError::PersistenceInit(_)
                | TriageError::Config(_)
                | TriageError::InvalidConfig { .. }
        )
    }

    /// Build a write error for the given record stream.
    pub fn write_failed(stream: impl Into<String>, reason: impl ToString) -> Self {
        TriageError::PersistenceWrite {
            stream: stream.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for triage operations.
pub type Result<T> = std::result::Result<T, TriageError>;
