// Fitted numeric scalers

use serde::{Deserialize, Serialize};

/// Numeric transform fitted at training time, applied to the reindexed vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scaler {
    /// Standardization: `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// Min-max scaling: `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
    /// Pass-through
    Identity,
}

impl Scaler {
    /// Number of columns the scaler was fit on, `None` when it accepts any width
    pub fn width(&self) -> Option<usize> {
        match self {
            Scaler::Standard { mean, .. } => Some(mean.len()),
            Scaler::MinMax { min, .. } => Some(min.len()),
            Scaler::Identity => None,
        }
    }

    /// Gets scaler kind
    pub fn kind(&self) -> &'static str {
        match self {
            Scaler::Standard { .. } => "standard",
            Scaler::MinMax { .. } => "min_max",
            Scaler::Identity => "identity",
        }
    }

    /// Checks internal consistency against the expected column count
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        let (a, b, names) = match self {
            Scaler::Standard { mean, scale } => (mean, scale, ("mean", "scale")),
            Scaler::MinMax { min, scale } => (min, scale, ("min", "scale")),
            Scaler::Identity => return Ok(()),
        };

        if a.len() != b.len() {
            return Err(format!(
                "scaler {} has {} entries but {} has {}",
                names.0,
                a.len(),
                names.1,
                b.len()
            ));
        }
        if a.len() != n_features {
            return Err(format!(
                "scaler was fit on {} columns, feature order has {}",
                a.len(),
                n_features
            ));
        }
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err("scaler parameters must be finite".to_string());
        }
        Ok(())
    }

    /// Scales values in place. Non-finite inputs stay non-finite.
    pub fn apply(&self, values: &mut [f64]) {
        match self {
            Scaler::Standard { mean, scale } => {
                for ((v, m), s) in values.iter_mut().zip(mean).zip(scale) {
                    // Constant training columns carry a zero scale; treat as unit.
                    let s = if *s == 0.0 { 1.0 } else { *s };
                    *v = (*v - m) / s;
                }
            }
            Scaler::MinMax { min, scale } => {
                for ((v, m), s) in values.iter_mut().zip(min).zip(scale) {
                    *v = *v * s + m;
                }
            }
            Scaler::Identity => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let scaler = Scaler::Standard {
            mean: vec![10.0, 0.5],
            scale: vec![2.0, 0.25],
        };
        let mut values = vec![14.0, 1.0];
        scaler.apply(&mut values);
        assert_eq!(values, vec![2.0, 2.0]);
    }

    #[test]
    fn test_zero_scale_is_unit() {
        let scaler = Scaler::Standard {
            mean: vec![3.0],
            scale: vec![0.0],
        };
        let mut values = vec![5.0];
        scaler.apply(&mut values);
        assert_eq!(values, vec![2.0]);
        assert!(values[0].is_finite());
    }

    #[test]
    fn test_min_max_scaler() {
        let scaler = Scaler::MinMax {
            min: vec![-1.0],
            scale: vec![0.1],
        };
        let mut values = vec![20.0];
        scaler.apply(&mut values);
        assert!((values[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nan_propagates() {
        let scaler = Scaler::Standard {
            mean: vec![1.0],
            scale: vec![2.0],
        };
        let mut values = vec![f64::NAN];
        scaler.apply(&mut values);
        assert!(values[0].is_nan());
    }

    #[test]
    fn test_validate_width() {
        let scaler = Scaler::Standard {
            mean: vec![0.0; 3],
            scale: vec![1.0; 3],
        };
        assert!(scaler.validate(3).is_ok());
        assert!(scaler.validate(4).is_err());
        assert!(Scaler::Identity.validate(17).is_ok());
    }

    #[test]
    fn test_deserialize() {
        let scaler: Scaler =
            serde_json::from_str(r#"{"type": "standard", "mean": [1.0], "scale": [2.0]}"#).unwrap();
        assert_eq!(scaler.kind(), "standard");
        assert_eq!(scaler.width(), Some(1));
    }
}
