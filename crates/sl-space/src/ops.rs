//! Arithmetic used by derived nodes.

use serde::{Deserialize, Serialize};
use sl_types::{ParameterValue, SpaceError};

/// Transform applied to a single decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathOp {
    Add(f64),
    Sub(f64),
    Mul(f64),
    Div(f64),
    Pow(f64),
    /// Round to the nearest integer.
    Round,
}

/// Binary operation combining two decoded values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
}

fn numeric(value: &ParameterValue, what: &str) -> Result<f64, SpaceError> {
    value.as_f64().ok_or_else(|| SpaceError::InvalidValue {
        message: format!("{what} expects a numeric input, got {value}"),
    })
}

fn finite(result: f64, what: &str) -> Result<ParameterValue, SpaceError> {
    if result.is_finite() {
        Ok(ParameterValue::Float(result))
    } else {
        Err(SpaceError::InvalidValue {
            message: format!("{what} produced a non-finite result"),
        })
    }
}

fn as_exact_int(v: f64) -> Option<i64> {
    (v.fract() == 0.0 && v.abs() < i64::MAX as f64).then_some(v as i64)
}

fn integer_overflow(what: &str) -> SpaceError {
    SpaceError::InvalidValue {
        message: format!("{what} overflowed the integer range"),
    }
}

impl MathOp {
    /// Apply the transform. Integer inputs stay integers under add, sub and
    /// mul by a whole operand.
    pub fn apply(&self, input: &ParameterValue) -> Result<ParameterValue, SpaceError> {
        let what = format!("{self:?}");
        if let (Some(x), Self::Add(v) | Self::Sub(v) | Self::Mul(v)) = (input.as_i64(), self) {
            if let Some(operand) = as_exact_int(*v) {
                let result = match self {
                    Self::Add(_) => x.checked_add(operand),
                    Self::Sub(_) => x.checked_sub(operand),
                    _ => x.checked_mul(operand),
                };
                return result
                    .map(ParameterValue::Int)
                    .ok_or_else(|| integer_overflow(&what));
            }
        }

        let x = numeric(input, &what)?;
        match self {
            Self::Add(v) => finite(x + v, &what),
            Self::Sub(v) => finite(x - v, &what),
            Self::Mul(v) => finite(x * v, &what),
            Self::Div(v) => {
                if *v == 0.0 {
                    return Err(SpaceError::InvalidValue {
                        message: "division by zero".to_string(),
                    });
                }
                finite(x / v, &what)
            }
            Self::Pow(v) => finite(x.powf(*v), &what),
            Self::Round => as_exact_int(x.round())
                .map(ParameterValue::Int)
                .ok_or_else(|| integer_overflow(&what)),
        }
    }
}

impl PairOp {
    pub fn apply(
        &self,
        left: &ParameterValue,
        right: &ParameterValue,
    ) -> Result<ParameterValue, SpaceError> {
        let what = format!("{self:?}");
        if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
            let result = match self {
                Self::Add => Some(a.checked_add(b)),
                Self::Sub => Some(a.checked_sub(b)),
                Self::Mul => Some(a.checked_mul(b)),
                Self::Min => Some(Some(a.min(b))),
                Self::Max => Some(Some(a.max(b))),
                Self::Div | Self::Pow => None,
            };
            if let Some(result) = result {
                return result
                    .map(ParameterValue::Int)
                    .ok_or_else(|| integer_overflow(&what));
            }
        }

        let a = numeric(left, &what)?;
        let b = numeric(right, &what)?;
        match self {
            Self::Add => finite(a + b, &what),
            Self::Sub => finite(a - b, &what),
            Self::Mul => finite(a * b, &what),
            Self::Div => {
                if b == 0.0 {
                    return Err(SpaceError::InvalidValue {
                        message: "division by zero".to_string(),
                    });
                }
                finite(a / b, &what)
            }
            Self::Pow => finite(a.powf(b), &what),
            Self::Min => finite(a.min(b), &what),
            Self::Max => finite(a.max(b), &what),
        }
    }
}
