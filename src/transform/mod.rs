//! Request-time feature transformation.
//!
//! Reproduces the training-time preprocessing for a single record, in order:
//!
//! 1. Replace every encoded column (all encoders except `target` and `profession`)
//!    with its integer code.
//! 2. Expand `profession` into drop-first one-hot indicator columns
//!    `profession_<category>`.
//! 3. Reindex to the bundle's feature order, filling absent columns with zero and
//!    dropping columns the model never saw.
//! 4. Apply the fitted scaler.
//!
//! The scorer accepts any vector of the right width, so a divergence here is a
//! silently wrong prediction. Unmapped categories are therefore always reported
//! and handled by an explicit [`UnknownCategoryPolicy`].

use crate::artifact::{ArtifactBundle, PROFESSION_PREFIX};
use crate::config::UnknownCategoryPolicy;
use crate::error::{Result, TriageError};
use crate::types::{FeatureRecord, PROFESSION_COLUMN};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// A category value the encoders have no code for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedValue {
    pub column: String,
    pub value: String,
}

/// Model input aligned positionally to the bundle's feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedVector {
    /// Scaled values, one per feature-order column.
    pub values: Vec<f64>,
    /// Columns that carried an unmapped category.
    pub unmapped: Vec<UnmappedValue>,
}

impl TransformedVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every column was mapped.
    pub fn is_complete(&self) -> bool {
        self.unmapped.is_empty()
    }
}

/// Intermediate column value before reindexing.
#[derive(Debug, Clone)]
enum Cell {
    Value(f64),
    Unmapped(String),
}

/// Turns raw records into model input for one artifact bundle.
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    bundle: Arc<ArtifactBundle>,
    policy: UnknownCategoryPolicy,
    /// Dropped first category, when the encoders name it.
    reference: Option<String>,
    /// Categories that get an indicator column.
    indicators: Vec<String>,
}

impl FeatureTransformer {
    pub fn new(bundle: Arc<ArtifactBundle>, policy: UnknownCategoryPolicy) -> Self {
        let (reference, indicators) = profession_categories(&bundle);
        Self {
            bundle,
            policy,
            reference,
            indicators,
        }
    }

    pub fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }

    /// Reference profession, encoded as an all-zero indicator block.
    pub fn reference_profession(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Width of every vector this transformer produces.
    pub fn width(&self) -> usize {
        self.bundle.feature_order.len()
    }

    /// Fails with [`TriageError::UnknownCategory`] when the reject policy would
    /// refuse this record. Other policies always pass.
    pub fn check(&self, record: &FeatureRecord) -> Result<()> {
        if self.policy != UnknownCategoryPolicy::Reject {
            return Ok(());
        }

        let columns = self.encode(record);
        for name in self.bundle.feature_order.names() {
            if let Some(Cell::Unmapped(raw)) = columns.get(name) {
                return Err(TriageError::UnknownCategory {
                    column: name.clone(),
                    value: raw.clone(),
                });
            }
        }
        Ok(())
    }

    /// Runs the four preprocessing steps on one record.
    pub fn transform(&self, record: &FeatureRecord) -> Result<TransformedVector> {
        let mut columns = self.encode(record);
        self.expand_profession(record, &mut columns);

        let order = &self.bundle.feature_order;
        let mut values = Vec::with_capacity(order.len());
        let mut unmapped = Vec::new();

        for name in order.names() {
            let value = match columns.remove(name) {
                None => 0.0,
                Some(Cell::Value(v)) => v,
                Some(Cell::Unmapped(raw)) => {
                    let value = self.resolve_unmapped(name, &raw)?;
                    unmapped.push(UnmappedValue {
                        column: name.clone(),
                        value: raw,
                    });
                    value
                }
            };
            values.push(value);
        }

        self.bundle.scaler.apply(&mut values);

        Ok(TransformedVector { values, unmapped })
    }

    /// Step 1: raw columns, with encoded columns replaced by their codes.
    fn encode(&self, record: &FeatureRecord) -> HashMap<String, Cell> {
        let encoders = &self.bundle.encoders;
        let encoded: HashSet<&str> = encoders.input_columns().collect();
        let mut columns = HashMap::with_capacity(self.width());

        for (column, value) in record.columns() {
            if column == PROFESSION_COLUMN {
                continue;
            }

            let cell = if encoded.contains(column) {
                let raw = value.to_string();
                match encoders.code(column, &raw) {
                    Some(code) => Cell::Value(code as f64),
                    None => Cell::Unmapped(raw),
                }
            } else {
                match value.as_f64() {
                    Some(v) => Cell::Value(v),
                    None => Cell::Unmapped(value.to_string()),
                }
            };
            columns.insert(column.to_string(), cell);
        }

        columns
    }

    /// Step 2: drop-first one-hot block for the profession.
    fn expand_profession(&self, record: &FeatureRecord, columns: &mut HashMap<String, Cell>) {
        if self.indicators.is_empty() {
            return;
        }

        let profession = record.profession.as_str();
        let known = self.reference.as_deref() == Some(profession)
            || self.indicators.iter().any(|p| p == profession);
        if !known {
            warn!(
                column = PROFESSION_COLUMN,
                value = %profession,
                "Profession not seen in training, encoding as reference category"
            );
        }

        for category in &self.indicators {
            let hit = if category == profession { 1.0 } else { 0.0 };
            columns.insert(format!("{}{}", PROFESSION_PREFIX, category), Cell::Value(hit));
        }
    }

    fn resolve_unmapped(&self, column: &str, raw: &str) -> Result<f64> {
        match self.policy {
            UnknownCategoryPolicy::Missing => {
                warn!(column = %column, value = %raw, "Unknown category, column marked missing");
                Ok(f64::NAN)
            }
            UnknownCategoryPolicy::Zero => {
                warn!(column = %column, value = %raw, "Unknown category, column filled with zero");
                Ok(0.0)
            }
            UnknownCategoryPolicy::Reject => Err(TriageError::UnknownCategory {
                column: column.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Reference category and indicator categories of the profession column.
///
/// The encoders list every training category, so the sorted first one is the
/// dropped reference. Without an encoder only the indicator columns in the
/// feature order are known.
fn profession_categories(bundle: &ArtifactBundle) -> (Option<String>, Vec<String>) {
    if let Some(names) = bundle.encoders.categories(PROFESSION_COLUMN) {
        let mut names: Vec<String> = names.into_iter().map(str::to_string).collect();
        names.sort();
        names.dedup();
        if names.is_empty() {
            return (None, names);
        }
        let reference = names.remove(0);
        return (Some(reference), names);
    }

    let mut indicators: Vec<String> = bundle
        .feature_order
        .names()
        .iter()
        .filter_map(|n| n.strip_prefix(PROFESSION_PREFIX))
        .map(str::to_string)
        .collect();
    indicators.sort();
    (None, indicators)
}
