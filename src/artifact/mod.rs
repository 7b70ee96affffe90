//! Model artifact bundle.
//!
//! The bundle is a single JSON document holding everything the service needs to
//! reproduce training-time preprocessing and score a record:
//!
//! - `model`: the fitted [`Classifier`]
//! - `encoders`: per-column [`CategoryEncoders`]
//! - `scaler`: the fitted [`Scaler`]
//! - `feature_order`: the exact column sequence the scaler and model were fit on
//!   (the older key `all_features` is accepted too)
//!
//! The bundle is loaded once by [`ArtifactStore::load`] and shared read-only for the
//! process lifetime. Loading validates the bundle as a whole so an inconsistent
//! artifact aborts startup instead of producing silently wrong predictions.

pub mod encoders;
pub mod model;
pub mod scaler;

pub use encoders::CategoryEncoders;
pub use model::{Classifier, DecisionTree, LinearModel, TreeEnsemble, TreeNode};
pub use scaler::Scaler;

use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bundle layout versions this build understands.
pub const SUPPORTED_SCHEMA_VERSIONS: &[u32] = &[1];

/// Prefix of the one-hot indicator columns for the profession field.
pub const PROFESSION_PREFIX: &str = "profession_";

/// Keys every bundle must carry.
const REQUIRED_KEYS: [&str; 4] = ["model", "encoders", "scaler", "feature_order"];

/// Ordered column names the model expects.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Builds a schema, rejecting empty or duplicated column lists.
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(TriageError::ArtifactLoad(
                "feature order must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(TriageError::ArtifactLoad(format!(
                    "feature order lists column '{}' twice",
                    name
                )));
            }
        }

        Ok(Self { names })
    }

    /// Column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Loaded, validated model bundle.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    /// Bundle layout version.
    pub schema_version: u32,
    /// Fitted classifier.
    pub model: Classifier,
    /// Fitted categorical encoders.
    pub encoders: CategoryEncoders,
    /// Fitted scaler.
    pub scaler: Scaler,
    /// Training-time column order.
    pub feature_order: FeatureSchema,
}

impl ArtifactBundle {
    /// Parses and validates a bundle from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| TriageError::ArtifactLoad(format!("bundle is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Parses and validates a bundle from a JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut root) = value else {
            return Err(TriageError::ArtifactLoad(
                "bundle must be a JSON object".to_string(),
            ));
        };

        if !root.contains_key("feature_order") {
            if let Some(features) = root.remove("all_features") {
                root.insert("feature_order".to_string(), features);
            }
        }

        for key in REQUIRED_KEYS {
            if !root.contains_key(key) {
                return Err(TriageError::ArtifactLoad(format!(
                    "bundle is missing required key '{}'",
                    key
                )));
            }
        }

        let schema_version = match root.remove("schema_version") {
            None | Some(Value::Null) => 1,
            Some(v) => v
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    TriageError::ArtifactLoad(format!("invalid schema_version: {}", v))
                })?,
        };

        let model: Classifier = take_component(&mut root, "model")?;
        let encoders: CategoryEncoders = take_component(&mut root, "encoders")?;
        let scaler: Scaler = take_component(&mut root, "scaler")?;
        let names: Vec<String> = take_component(&mut root, "feature_order")?;
        let feature_order = FeatureSchema::new(names)?;

        let bundle = Self {
            schema_version,
            model,
            encoders,
            scaler,
            feature_order,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Cross-checks the components against each other.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&self.schema_version) {
            return Err(TriageError::ArtifactLoad(format!(
                "unsupported schema_version {} (supported: {:?})",
                self.schema_version, SUPPORTED_SCHEMA_VERSIONS
            )));
        }

        let width = self.feature_order.len();
        self.scaler.validate(width).map_err(TriageError::ArtifactLoad)?;
        self.model.validate(width).map_err(TriageError::ArtifactLoad)?;
        self.encoders.validate().map_err(TriageError::ArtifactLoad)?;

        Ok(())
    }

    /// Short description for logs and the `check` command.
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            schema_version: self.schema_version,
            model_kind: self.model.kind().to_string(),
            classes: self.model.classes().to_vec(),
            scaler_kind: self.scaler.kind().to_string(),
            encoded_columns: self.encoders.len(),
            feature_count: self.feature_order.len(),
        }
    }
}

fn take_component<T: serde::de::DeserializeOwned>(
    root: &mut serde_json::Map<String, Value>,
    key: &str,
) -> Result<T> {
    let value = root.remove(key).unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| TriageError::ArtifactLoad(format!("invalid '{}': {}", key, e)))
}

/// Bundle facts reported on startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub schema_version: u32,
    pub model_kind: String,
    pub classes: Vec<String>,
    pub scaler_kind: String,
    pub encoded_columns: usize,
    pub feature_count: usize,
}

/// Loads the bundle from a fixed location.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the bundle. Any failure is an [`TriageError::ArtifactLoad`].
    pub fn load(&self) -> Result<ArtifactBundle> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            TriageError::ArtifactLoad(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let bundle = ArtifactBundle::from_json_str(&content)?;

        let summary = bundle.summary();
        info!(
            path = %self.path.display(),
            model = %summary.model_kind,
            features = summary.feature_count,
            classes = summary.classes.len(),
            "Artifact bundle loaded"
        );

        if !bundle
            .feature_order
            .names()
            .iter()
            .any(|n| n.starts_with(PROFESSION_PREFIX))
        {
            warn!("Feature order has no profession indicator columns");
        }

        Ok(bundle)
    }
}
