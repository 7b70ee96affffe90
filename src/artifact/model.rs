// Fitted classifiers
//
// Scoring is deterministic: ties between classes resolve to the lowest index,
// tree traversal goes left on `x[feature] <= threshold`.

use crate::error::{Result, TriageError};
use serde::{Deserialize, Deserializer, Serialize};

/// Scoring function mapping a scaled feature vector to a class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Classifier {
    /// Linear decision function (logistic regression, linear SVM, ...)
    Linear(LinearModel),
    /// Averaged decision trees (single tree, random forest, ...)
    TreeEnsemble(TreeEnsemble),
}

impl Classifier {
    /// Known class labels
    pub fn classes(&self) -> &[String] {
        match self {
            Classifier::Linear(m) => &m.classes,
            Classifier::TreeEnsemble(m) => &m.classes,
        }
    }

    /// Gets model kind
    pub fn kind(&self) -> &'static str {
        match self {
            Classifier::Linear(_) => "linear",
            Classifier::TreeEnsemble(_) => "tree_ensemble",
        }
    }

    /// Checks the model can score vectors of `n_features` columns
    pub fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.classes().is_empty() {
            return Err("model declares no classes".to_string());
        }
        match self {
            Classifier::Linear(m) => m.validate(n_features),
            Classifier::TreeEnsemble(m) => m.validate(n_features),
        }
    }

    /// Predicts the label for one vector.
    ///
    /// Vectors carrying a non-finite value (the unknown-category marker) are refused.
    pub fn predict(&self, features: &[f64]) -> Result<&str> {
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            return Err(TriageError::Scoring(format!(
                "feature at position {} is not a finite number",
                pos
            )));
        }

        let index = match self {
            Classifier::Linear(m) => m.predict_index(features)?,
            Classifier::TreeEnsemble(m) => m.predict_index(features)?,
        };

        self.classes()
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| TriageError::Scoring(format!("class index {} out of range", index)))
    }
}

/// Linear model: one coefficient row per class, or a single row for binary problems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Class labels
    #[serde(deserialize_with = "deserialize_labels")]
    pub classes: Vec<String>,
    /// Coefficient rows
    pub coefficients: Vec<Vec<f64>>,
    /// Intercept per row
    pub intercepts: Vec<f64>,
}

impl LinearModel {
    fn is_binary(&self) -> bool {
        self.coefficients.len() == 1 && self.classes.len() == 2
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if !self.is_binary() && self.coefficients.len() != self.classes.len() {
            return Err(format!(
                "linear model has {} coefficient rows for {} classes",
                self.coefficients.len(),
                self.classes.len()
            ));
        }
        if self.intercepts.len() != self.coefficients.len() {
            return Err(format!(
                "linear model has {} intercepts for {} coefficient rows",
                self.intercepts.len(),
                self.coefficients.len()
            ));
        }
        if let Some(row) = self.coefficients.iter().find(|r| r.len() != n_features) {
            return Err(format!(
                "linear model expects {} inputs, feature order has {}",
                row.len(),
                n_features
            ));
        }
        Ok(())
    }

    fn decision(&self, features: &[f64]) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }

    fn predict_index(&self, features: &[f64]) -> Result<usize> {
        if let Some(row) = self.coefficients.first() {
            if row.len() != features.len() {
                return Err(TriageError::Scoring(format!(
                    "expected {} inputs, got {}",
                    row.len(),
                    features.len()
                )));
            }
        }

        let scores = self.decision(features);
        if self.is_binary() {
            return Ok(if scores[0] > 0.0 { 1 } else { 0 });
        }
        Ok(argmax(&scores))
    }
}

/// Ensemble of decision trees with averaged class distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    /// Class labels
    #[serde(deserialize_with = "deserialize_labels")]
    pub classes: Vec<String>,
    /// Member trees
    pub trees: Vec<DecisionTree>,
}

impl TreeEnsemble {
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("tree ensemble has no trees".to_string());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features, self.classes.len())
                .map_err(|e| format!("tree {}: {}", t, e))?;
        }
        Ok(())
    }

    fn predict_index(&self, features: &[f64]) -> Result<usize> {
        let mut totals = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf_for(features)?;
            let sum: f64 = leaf.iter().sum();
            for (total, v) in totals.iter_mut().zip(leaf) {
                *total += if sum > 0.0 { v / sum } else { *v };
            }
        }
        Ok(argmax(&totals))
    }
}

/// Decision tree stored as a flat node array; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal node
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Leaf with per-class weights
    Leaf { value: Vec<f64> },
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            i, feature, n_features
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", i));
                    }
                    // Children always come after their parent, which rules out cycles.
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", i, child));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.len() != n_classes {
                        return Err(format!(
                            "leaf {} has {} weights for {} classes",
                            i,
                            value.len(),
                            n_classes
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_for(&self, features: &[f64]) -> Result<&[f64]> {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return Ok(value.as_slice()),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = features.get(*feature).ok_or_else(|| {
                        TriageError::Scoring(format!("missing input at position {}", feature))
                    })?;
                    index = if *x <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(TriageError::Scoring(format!(
                        "tree walked to missing node {}",
                        index
                    )))
                }
            }
        }
    }
}

fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, s) in scores.iter().enumerate() {
        if *s > scores[best] {
            best = i;
        }
    }
    best
}

/// Class labels may be serialized as strings or numbers; keep their text form
fn deserialize_labels<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            serde_json::Value::Bool(b) => Ok(b.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "class label must be a string or number, got {}",
                other
            ))),
        })
        .collect()
}
