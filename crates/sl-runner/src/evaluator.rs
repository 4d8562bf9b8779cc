//! The scoring boundary: user code that turns a configuration into a score.

use serde::{Deserialize, Serialize};
use sl_types::{ObjectiveDirection, ParameterValue};

/// Outcome of evaluating one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    /// Anything worth keeping alongside the score (model summary, metrics...).
    pub artifact: Option<serde_json::Value>,
}

impl Evaluation {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: serde_json::Value) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// Supplies training and validation data for a configuration.
pub trait DataProvider: Send + Sync {
    fn training_data(&self, config: &ParameterValue) -> anyhow::Result<serde_json::Value>;

    fn validation_data(&self, config: &ParameterValue) -> anyhow::Result<serde_json::Value>;
}

/// Provider for evaluators that bring their own data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoData;

impl DataProvider for NoData {
    fn training_data(&self, _config: &ParameterValue) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn validation_data(&self, _config: &ParameterValue) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

/// Scores candidate configurations. Called concurrently from worker threads.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        config: &ParameterValue,
        data: &dyn DataProvider,
    ) -> anyhow::Result<Evaluation>;

    fn direction(&self) -> ObjectiveDirection {
        ObjectiveDirection::Maximize
    }
}

/// Adapts a plain scoring function into an [`Evaluator`].
pub struct FnEvaluator<F> {
    f: F,
    direction: ObjectiveDirection,
}

impl<F> FnEvaluator<F>
where
    F: Fn(&ParameterValue) -> anyhow::Result<f64> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            direction: ObjectiveDirection::Maximize,
        }
    }

    pub fn minimizing(f: F) -> Self {
        Self {
            f,
            direction: ObjectiveDirection::Minimize,
        }
    }
}

impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&ParameterValue) -> anyhow::Result<f64> + Send + Sync,
{
    fn evaluate(
        &self,
        config: &ParameterValue,
        _data: &dyn DataProvider,
    ) -> anyhow::Result<Evaluation> {
        (self.f)(config).map(Evaluation::new)
    }

    fn direction(&self) -> ObjectiveDirection {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[test]
    fn fn_evaluator_forwards_score_and_errors() {
        let eval = FnEvaluator::new(|config: &ParameterValue| match config.as_f64() {
            Some(x) if x >= 0.0 => Ok(x.sqrt()),
            _ => bail!("negative input"),
        });
        let score = eval.evaluate(&ParameterValue::Float(4.0), &NoData).unwrap();
        assert_eq!(score, Evaluation::new(2.0));
        assert!(eval.evaluate(&ParameterValue::Float(-1.0), &NoData).is_err());
        assert_eq!(eval.direction(), ObjectiveDirection::Maximize);
    }

    #[test]
    fn no_data_is_null() {
        let config = ParameterValue::Int(1);
        assert!(NoData.training_data(&config).unwrap().is_null());
        assert!(NoData.validation_data(&config).unwrap().is_null());
    }
}
