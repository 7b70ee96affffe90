//! Core data types for triage.
//!
//! A [`FeatureRecord`] is one user submission. It is built from loosely typed JSON
//! with the same lax coercion rules the training-side tooling used, persisted verbatim,
//! and then handed to the feature transformer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Raw input columns, in the order they are stored.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "age",
    "weight",
    "height",
    "exercise",
    "sleep",
    "sugar_intake",
    "smoking",
    "alcohol",
    "married",
    "profession",
    "bmi",
];

/// Column holding the nominal field that is one-hot expanded instead of code-encoded.
pub const PROFESSION_COLUMN: &str = "profession";

/// Encoder entry for the training label; never applied to inputs.
pub const TARGET_COLUMN: &str = "target";

/// One user submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub age: i64,
    pub weight: i64,
    pub height: i64,
    pub exercise: String,
    pub sleep: f64,
    pub sugar_intake: String,
    pub smoking: String,
    pub alcohol: String,
    pub married: String,
    pub profession: String,
    pub bmi: f64,
}

/// A single raw field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Int(i64),
    Real(f64),
    Text(&'a str),
}

impl FieldValue<'_> {
    /// Numeric view of the value, `None` for categories.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Real(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl FeatureRecord {
    /// Build a record from a JSON body, collecting every field-level problem.
    ///
    /// Integers accept integral floats and numeric strings, reals accept integers and
    /// numeric strings, categories accept strings only. Unknown keys are ignored.
    pub fn from_json(body: &Value) -> std::result::Result<Self, Vec<FieldError>> {
        let Some(obj) = body.as_object() else {
            return Err(vec![FieldError::new("body", "Input should be a valid JSON object")]);
        };

        let mut errors = Vec::new();
        let age = int_field(obj, "age", &mut errors);
        let weight = int_field(obj, "weight", &mut errors);
        let height = int_field(obj, "height", &mut errors);
        let exercise = text_field(obj, "exercise", &mut errors);
        let sleep = real_field(obj, "sleep", &mut errors);
        let sugar_intake = text_field(obj, "sugar_intake", &mut errors);
        let smoking = text_field(obj, "smoking", &mut errors);
        let alcohol = text_field(obj, "alcohol", &mut errors);
        let married = text_field(obj, "married", &mut errors);
        let profession = text_field(obj, "profession", &mut errors);
        let bmi = real_field(obj, "bmi", &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        // Every field parsed, so each Option is populated.
        match (
            age, weight, height, exercise, sleep, sugar_intake, smoking, alcohol, married,
            profession, bmi,
        ) {
            (
                Some(age),
                Some(weight),
                Some(height),
                Some(exercise),
                Some(sleep),
                Some(sugar_intake),
                Some(smoking),
                Some(alcohol),
                Some(married),
                Some(profession),
                Some(bmi),
            ) => Ok(Self {
                age,
                weight,
                height,
                exercise,
                sleep,
                sugar_intake,
                smoking,
                alcohol,
                married,
                profession,
                bmi,
            }),
            _ => Err(vec![FieldError::new("body", "Incomplete record")]),
        }
    }

    /// Look up a raw column by name.
    pub fn value(&self, column: &str) -> Option<FieldValue<'_>> {
        let value = match column {
            "age" => FieldValue::Int(self.age),
            "weight" => FieldValue::Int(self.weight),
            "height" => FieldValue::Int(self.height),
            "exercise" => FieldValue::Text(&self.exercise),
            "sleep" => FieldValue::Real(self.sleep),
            "sugar_intake" => FieldValue::Text(&self.sugar_intake),
            "smoking" => FieldValue::Text(&self.smoking),
            "alcohol" => FieldValue::Text(&self.alcohol),
            "married" => FieldValue::Text(&self.married),
            "profession" => FieldValue::Text(&self.profession),
            "bmi" => FieldValue::Real(self.bmi),
            _ => return None,
        };
        Some(value)
    }

    /// All columns with their values, in storage order.
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, FieldValue<'_>)> {
        FEATURE_COLUMNS
            .iter()
            .filter_map(move |&name| self.value(name).map(|v| (name, v)))
    }
}

fn int_field(obj: &Map<String, Value>, name: &str, errors: &mut Vec<FieldError>) -> Option<i64> {
    let Some(value) = obj.get(name) else {
        errors.push(FieldError::missing(name));
        return None;
    };

    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    if parsed.is_none() {
        errors.push(FieldError::new(
            name,
            "Input should be a valid integer, unable to parse input as an integer",
        ));
    }
    parsed
}

fn real_field(obj: &Map<String, Value>, name: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    let Some(value) = obj.get(name) else {
        errors.push(FieldError::missing(name));
        return None;
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    };

    if parsed.is_none() {
        errors.push(FieldError::new(
            name,
            "Input should be a valid number, unable to parse input as a number",
        ));
    }
    parsed
}

fn text_field(obj: &Map<String, Value>, name: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match obj.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(FieldError::new(name, "Input should be a valid string"));
            None
        }
        None => {
            errors.push(FieldError::missing(name));
            None
        }
    }
}

/// A field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Offending field name (`body` for whole-document problems).
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "Field required")
    }
}

/// Label produced by the model for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: String,
}

impl PredictionResult {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// The two append-only record streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStream {
    /// Raw submissions.
    Features,
    /// Prediction outcomes.
    Predicts,
}

impl RecordStream {
    /// Table backing the stream.
    pub fn table_name(&self) -> &'static str {
        match self {
            RecordStream::Features => "Features",
            RecordStream::Predicts => "Predicts",
        }
    }
}

impl fmt::Display for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
