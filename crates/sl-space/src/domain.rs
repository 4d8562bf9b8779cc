//! Leaf domains and their decoding rules.

use serde::{Deserialize, Serialize};
use sl_types::{ParameterValue, SpaceError};

/// Describes how a single leaf turns its slice of the vector into a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    /// Constant value; consumes no vector positions.
    Fixed { value: ParameterValue },
    /// Continuous uniform range [low, high].
    Continuous { low: f64, high: f64 },
    /// Log-uniform range (scaled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    Integer { low: i64, high: i64 },
    /// Categorical choices.
    Discrete { options: Vec<ParameterValue> },
    /// `len` independent draws from the same continuous range.
    ContinuousVector { low: f64, high: f64, len: usize },
}

/// Maps `u ∈ [0, 1]` onto one of `k` buckets. `u == 1.0` lands in the last one.
pub(crate) fn bucket(u: f64, k: usize) -> usize {
    ((u * k as f64).floor() as usize).min(k.saturating_sub(1))
}

impl Domain {
    /// Number of vector positions this leaf consumes.
    pub fn num_parameters(&self) -> usize {
        match self {
            Self::Fixed { .. } => 0,
            Self::ContinuousVector { len, .. } => *len,
            _ => 1,
        }
    }

    /// Number of distinct values the domain can take, when that is finite.
    pub fn natural_levels(&self) -> Option<usize> {
        match self {
            Self::Discrete { options } => Some(options.len()),
            Self::Integer { low, high } => usize::try_from(high.abs_diff(*low))
                .ok()
                .and_then(|span| span.checked_add(1)),
            _ => None,
        }
    }

    pub(crate) fn validate(&self, leaf: usize) -> Result<(), SpaceError> {
        let invalid = |message: String| Err(SpaceError::InvalidDomain { leaf, message });
        match self {
            Self::Fixed { .. } => Ok(()),
            Self::Continuous { low, high } | Self::ContinuousVector { low, high, .. } => {
                if !low.is_finite() || !high.is_finite() {
                    return invalid(format!("bounds must be finite, got [{low}, {high}]"));
                }
                if low > high {
                    return invalid(format!("low {low} is greater than high {high}"));
                }
                if let Self::ContinuousVector { len: 0, .. } = self {
                    return invalid("vector length must be at least 1".to_string());
                }
                Ok(())
            }
            Self::LogUniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || *low <= 0.0 {
                    return invalid(format!(
                        "log-uniform bounds must be finite and positive, got [{low}, {high}]"
                    ));
                }
                if low > high {
                    return invalid(format!("low {low} is greater than high {high}"));
                }
                Ok(())
            }
            Self::Integer { low, high } => {
                if low > high {
                    return invalid(format!("low {low} is greater than high {high}"));
                }
                if self.natural_levels().is_none() {
                    return invalid(format!("integer range [{low}, {high}] is too wide"));
                }
                Ok(())
            }
            Self::Discrete { options } => {
                if options.is_empty() {
                    return invalid("discrete domain needs at least one option".to_string());
                }
                Ok(())
            }
        }
    }

    /// Decode this leaf's slice of the vector. `offset` is the global position
    /// of `values[0]`, used only for error reporting.
    pub fn decode(&self, values: &[f64], offset: usize) -> Result<ParameterValue, SpaceError> {
        if values.len() != self.num_parameters() {
            return Err(SpaceError::VectorLengthMismatch {
                expected: self.num_parameters(),
                actual: values.len(),
            });
        }
        for (i, u) in values.iter().enumerate() {
            if !(0.0..=1.0).contains(u) {
                return Err(SpaceError::ValueOutOfRange {
                    position: offset + i,
                    value: *u,
                });
            }
        }

        let value = match self {
            Self::Fixed { value } => value.clone(),
            Self::Continuous { low, high } => ParameterValue::Float(low + values[0] * (high - low)),
            Self::LogUniform { low, high } => {
                let log_low = low.ln();
                let log_high = high.ln();
                ParameterValue::Float((log_low + values[0] * (log_high - log_low)).exp())
            }
            Self::Integer { low, .. } => {
                // validate() guarantees the level count fits in usize
                let k = self.natural_levels().unwrap_or(1);
                ParameterValue::Int(low.wrapping_add(bucket(values[0], k) as i64))
            }
            Self::Discrete { options } => options[bucket(values[0], options.len())].clone(),
            Self::ContinuousVector { low, high, .. } => ParameterValue::List(
                values
                    .iter()
                    .map(|u| ParameterValue::Float(low + u * (high - low)))
                    .collect(),
            ),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(values: &[&str]) -> Vec<ParameterValue> {
        values.iter().map(|v| ParameterValue::Json(json!(v))).collect()
    }

    #[test]
    fn continuous_scales_linearly() {
        let d = Domain::Continuous { low: 2.0, high: 4.0 };
        assert_eq!(d.decode(&[0.0], 0).unwrap(), ParameterValue::Float(2.0));
        assert_eq!(d.decode(&[0.5], 0).unwrap(), ParameterValue::Float(3.0));
        assert_eq!(d.decode(&[1.0], 0).unwrap(), ParameterValue::Float(4.0));
    }

    #[test]
    fn discrete_top_of_range_does_not_overflow() {
        let d = Domain::Discrete {
            options: options(&["relu", "tanh", "sigmoid"]),
        };
        assert_eq!(d.decode(&[0.0], 0).unwrap().as_str(), Some("relu"));
        assert_eq!(d.decode(&[0.34], 0).unwrap().as_str(), Some("tanh"));
        assert_eq!(d.decode(&[1.0], 0).unwrap().as_str(), Some("sigmoid"));
    }

    #[test]
    fn integer_range_is_inclusive() {
        let d = Domain::Integer { low: 50, high: 75 };
        assert_eq!(d.decode(&[0.0], 0).unwrap(), ParameterValue::Int(50));
        assert_eq!(d.decode(&[1.0], 0).unwrap(), ParameterValue::Int(75));
        assert_eq!(d.natural_levels(), Some(26));
    }

    #[test]
    fn log_uniform_hits_bounds() {
        let d = Domain::LogUniform { low: 1e-4, high: 1e-1 };
        let low = d.decode(&[0.0], 0).unwrap().as_f64().unwrap();
        let high = d.decode(&[1.0], 0).unwrap().as_f64().unwrap();
        assert!((low - 1e-4).abs() < 1e-12);
        assert!((high - 1e-1).abs() < 1e-12);
    }

    #[test]
    fn fixed_ignores_vector() {
        let d = Domain::Fixed {
            value: ParameterValue::Int(10),
        };
        assert_eq!(d.num_parameters(), 0);
        assert_eq!(d.decode(&[], 0).unwrap(), ParameterValue::Int(10));
    }

    #[test]
    fn vector_leaf_decodes_each_position() {
        let d = Domain::ContinuousVector {
            low: 0.0,
            high: 10.0,
            len: 3,
        };
        let value = d.decode(&[0.0, 0.5, 1.0], 4).unwrap();
        assert_eq!(
            value,
            ParameterValue::List(vec![
                ParameterValue::Float(0.0),
                ParameterValue::Float(5.0),
                ParameterValue::Float(10.0),
            ])
        );
    }

    #[test]
    fn out_of_range_entry_reports_global_position() {
        let d = Domain::Continuous { low: 0.0, high: 1.0 };
        let err = d.decode(&[1.5], 7).unwrap_err();
        assert_eq!(
            err,
            SpaceError::ValueOutOfRange {
                position: 7,
                value: 1.5
            }
        );
        assert!(d.decode(&[f64::NAN], 0).is_err());
    }

    #[test]
    fn validation_rejects_malformed_domains() {
        assert!(Domain::Continuous { low: 1.0, high: 0.0 }.validate(0).is_err());
        assert!(Domain::LogUniform { low: 0.0, high: 1.0 }.validate(0).is_err());
        assert!(Domain::Discrete { options: vec![] }.validate(0).is_err());
        assert!(Domain::ContinuousVector {
            low: 0.0,
            high: 1.0,
            len: 0
        }
        .validate(0)
        .is_err());
        assert!(Domain::Integer {
            low: i64::MIN,
            high: i64::MAX
        }
        .validate(0)
        .is_err());
        assert!(Domain::Integer { low: 1, high: 3 }.validate(0).is_ok());
    }

    #[test]
    fn domain_serialization_roundtrip() {
        let d = Domain::Discrete {
            options: options(&["adam", "sgd"]),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"type\":\"discrete\""));
        let back: Domain = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
