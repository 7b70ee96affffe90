// Categorical encoders

use crate::types::{FEATURE_COLUMNS, PROFESSION_COLUMN, TARGET_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-column `category -> integer code` mappings frozen at training time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryEncoders {
    columns: BTreeMap<String, BTreeMap<String, i64>>,
}

impl CategoryEncoders {
    /// Creates encoders from raw mappings
    pub fn new(columns: BTreeMap<String, BTreeMap<String, i64>>) -> Self {
        Self { columns }
    }

    /// Columns whose values are replaced by codes, i.e. everything except
    /// the target label and the one-hot expanded profession column
    pub fn input_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .keys()
            .map(String::as_str)
            .filter(|name| *name != TARGET_COLUMN && *name != PROFESSION_COLUMN)
    }

    /// Gets the code for a category
    pub fn code(&self, column: &str, value: &str) -> Option<i64> {
        self.columns.get(column).and_then(|m| m.get(value)).copied()
    }

    /// Category names of a column, sorted
    pub fn categories(&self, column: &str) -> Option<Vec<&str>> {
        self.columns
            .get(column)
            .map(|m| m.keys().map(String::as_str).collect())
    }

    /// Reverse lookup of a target code
    pub fn decode_target(&self, code: &str) -> Option<&str> {
        let code: i64 = code.trim().parse().ok()?;
        self.columns
            .get(TARGET_COLUMN)?
            .iter()
            .find(|(_, c)| **c == code)
            .map(|(name, _)| name.as_str())
    }

    /// Number of encoded columns, target included
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Every encoder other than `target` must name a raw input column
    pub fn validate(&self) -> Result<(), String> {
        for name in self.columns.keys() {
            if name != TARGET_COLUMN && !FEATURE_COLUMNS.contains(&name.as_str()) {
                return Err(format!("encoder for unknown input column '{}'", name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoders() -> CategoryEncoders {
        serde_json::from_str(
            r#"{
                "exercise": {"high": 0, "low": 1, "none": 2, "regular": 3},
                "profession": {"doctor": 0, "engineer": 1, "teacher": 2},
                "target": {"high": 0, "low": 1}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_input_columns_skip_reserved() {
        let enc = encoders();
        let names: Vec<_> = enc.input_columns().collect();
        assert_eq!(names, vec!["exercise"]);
    }

    #[test]
    fn test_code_lookup() {
        let enc = encoders();
        assert_eq!(enc.code("exercise", "regular"), Some(3));
        assert_eq!(enc.code("exercise", "sometimes"), None);
        assert_eq!(enc.code("smoking", "no"), None);
    }

    #[test]
    fn test_categories_sorted() {
        let enc = encoders();
        assert_eq!(
            enc.categories("profession").unwrap(),
            vec!["doctor", "engineer", "teacher"]
        );
    }

    #[test]
    fn test_decode_target() {
        let enc = encoders();
        assert_eq!(enc.decode_target("1"), Some("low"));
        assert_eq!(enc.decode_target("7"), None);
        assert_eq!(enc.decode_target("low"), None);
    }

    #[test]
    fn test_validate_unknown_column() {
        let enc: CategoryEncoders =
            serde_json::from_str(r#"{"eye_color": {"blue": 0}}"#).unwrap();
        assert!(enc.validate().is_err());
        assert!(encoders().validate().is_ok());
    }
}
