// Artifact bundles and request bodies shared by integration tests

use serde_json::{json, Value};

/// Feature order of the fixture bundle. `doctor` is the dropped reference profession.
pub const FEATURE_ORDER: [&str; 13] = [
    "age",
    "weight",
    "height",
    "exercise",
    "sleep",
    "sugar_intake",
    "smoking",
    "alcohol",
    "married",
    "bmi",
    "profession_engineer",
    "profession_farmer",
    "profession_teacher",
];

/// Binary linear bundle: older, heavier smokers score "high", everyone else "low".
///
/// Scaled age and bmi each count against the intercept, smoking counts double.
pub fn bundle() -> Value {
    let mut mean = vec![0.0; FEATURE_ORDER.len()];
    let mut scale = vec![1.0; FEATURE_ORDER.len()];
    mean[0] = 40.0;
    scale[0] = 10.0;
    mean[9] = 25.0;
    scale[9] = 5.0;

    let mut coefficients = vec![0.0; FEATURE_ORDER.len()];
    coefficients[0] = -1.0;
    coefficients[6] = -2.0;
    coefficients[9] = -1.0;

    json!({
        "schema_version": 1,
        "model": {
            "type": "linear",
            "classes": ["high", "low"],
            "coefficients": [coefficients],
            "intercepts": [1.0]
        },
        "encoders": {
            "exercise": {"high": 0, "low": 1, "none": 2, "regular": 3},
            "sugar_intake": {"high": 0, "low": 1, "medium": 2},
            "smoking": {"no": 0, "yes": 1},
            "alcohol": {"no": 0, "yes": 1},
            "married": {"no": 0, "yes": 1},
            "profession": {"doctor": 0, "engineer": 1, "farmer": 2, "teacher": 3},
            "target": {"high": 0, "low": 1}
        },
        "scaler": {"type": "standard", "mean": mean, "scale": scale},
        "feature_order": FEATURE_ORDER
    })
}

/// A submission the fixture model scores "low".
pub fn healthy_request() -> Value {
    json!({
        "age": 34,
        "weight": 78,
        "height": 175,
        "exercise": "regular",
        "sleep": 7.5,
        "sugar_intake": "low",
        "smoking": "no",
        "alcohol": "no",
        "married": "yes",
        "profession": "engineer",
        "bmi": 25.4
    })
}

/// A submission the fixture model scores "high".
pub fn risky_request() -> Value {
    json!({
        "age": 70,
        "weight": 110,
        "height": 177,
        "exercise": "none",
        "sleep": 5.0,
        "sugar_intake": "high",
        "smoking": "yes",
        "alcohol": "yes",
        "married": "no",
        "profession": "farmer",
        "bmi": 35.0
    })
}
