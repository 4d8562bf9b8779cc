//! Run configuration: the validated bundle the runner executes, and a
//! serializable descriptor for storing runs as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sl_optimizer::{CandidateGenerator, GeneratorConfig};
use sl_space::ParameterSpace;
use sl_types::{config_error, ObjectiveDirection, SearchResult};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::evaluator::{DataProvider, Evaluator, NoData};
use crate::listener::{StatusListener, DEFAULT_LISTENER_TIMEOUT};
use crate::persist::ResultPersister;
use crate::termination::TerminationCondition;

/// Everything the runner needs. Built through [`OptimizationConfig::builder`].
pub struct OptimizationConfig {
    pub(crate) run_id: Uuid,
    pub(crate) name: String,
    pub(crate) generator: Box<dyn CandidateGenerator>,
    pub(crate) evaluator: Arc<dyn Evaluator>,
    pub(crate) data: Arc<dyn DataProvider>,
    pub(crate) persister: Option<Arc<dyn ResultPersister>>,
    pub(crate) termination: Vec<TerminationCondition>,
    pub(crate) concurrency: usize,
    pub(crate) listeners: Vec<Box<dyn StatusListener>>,
    pub(crate) listener_timeout: Duration,
}

impl OptimizationConfig {
    pub fn builder() -> OptimizationConfigBuilder {
        OptimizationConfigBuilder::default()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.evaluator.direction()
    }

    pub fn termination(&self) -> &[TerminationCondition] {
        &self.termination
    }
}

pub struct OptimizationConfigBuilder {
    run_id: Option<Uuid>,
    name: String,
    generator: Option<Box<dyn CandidateGenerator>>,
    evaluator: Option<Arc<dyn Evaluator>>,
    data: Arc<dyn DataProvider>,
    persister: Option<Arc<dyn ResultPersister>>,
    termination: Vec<TerminationCondition>,
    concurrency: usize,
    direction: Option<ObjectiveDirection>,
    listeners: Vec<Box<dyn StatusListener>>,
    listener_timeout: Duration,
}

impl Default for OptimizationConfigBuilder {
    fn default() -> Self {
        Self {
            run_id: None,
            name: "optimization".to_string(),
            generator: None,
            evaluator: None,
            data: Arc::new(NoData),
            persister: None,
            termination: Vec::new(),
            concurrency: 1,
            direction: None,
            listeners: Vec::new(),
            listener_timeout: DEFAULT_LISTENER_TIMEOUT,
        }
    }
}

impl OptimizationConfigBuilder {
    pub fn with_run_id(mut self, id: Uuid) -> Self {
        self.run_id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn CandidateGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn with_shared_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_data_provider(mut self, data: impl DataProvider + 'static) -> Self {
        self.data = Arc::new(data);
        self
    }

    pub fn with_persister(mut self, persister: Arc<dyn ResultPersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Add a stop condition. The run ends as soon as any one holds.
    pub fn with_termination(mut self, condition: TerminationCondition) -> Self {
        self.termination.push(condition);
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Expected objective direction; checked against the evaluator and the
    /// generator at build time.
    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_listener(mut self, listener: impl StatusListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// How long a finished run waits for listeners to take their remaining
    /// events before detaching them.
    pub fn with_listener_timeout(mut self, timeout: Duration) -> Self {
        self.listener_timeout = timeout;
        self
    }

    pub fn build(self) -> SearchResult<OptimizationConfig> {
        let generator = self
            .generator
            .ok_or_else(|| config_error!("no candidate generator configured"))?;
        let evaluator = self
            .evaluator
            .ok_or_else(|| config_error!("no evaluator configured"))?;

        if self.concurrency == 0 {
            return Err(config_error!("concurrency must be at least 1"));
        }
        if self.termination.is_empty() && generator.total_candidates().is_none() {
            return Err(config_error!(
                "generator '{}' is unbounded; add a termination condition",
                generator.name()
            ));
        }
        for condition in &self.termination {
            condition.validate().map_err(|e| config_error!("{e}"))?;
        }

        let direction = evaluator.direction();
        if let Some(expected) = self.direction {
            if expected != direction {
                return Err(config_error!(
                    "evaluator direction {direction:?} does not match configured {expected:?}"
                ));
            }
        }
        if let Some(generator_direction) = generator.objective_direction() {
            if generator_direction != direction {
                return Err(config_error!(
                    "generator '{}' optimizes {generator_direction:?} but the evaluator is {direction:?}",
                    generator.name()
                ));
            }
        }

        Ok(OptimizationConfig {
            run_id: self.run_id.unwrap_or_else(Uuid::new_v4),
            name: self.name,
            generator,
            evaluator,
            data: self.data,
            persister: self.persister,
            termination: self.termination,
            concurrency: self.concurrency,
            listeners: self.listeners,
            listener_timeout: self.listener_timeout,
        })
    }
}

fn default_concurrency() -> usize {
    1
}

/// Serializable record of a run: what is searched, how, and when to stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub id: Uuid,
    pub name: String,
    pub space: ParameterSpace,
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub termination: Vec<TerminationCondition>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub direction: ObjectiveDirection,
    pub created_at: DateTime<Utc>,
}

impl RunDescriptor {
    pub fn new(name: impl Into<String>, space: ParameterSpace, generator: GeneratorConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            space,
            generator,
            termination: Vec::new(),
            concurrency: default_concurrency(),
            direction: ObjectiveDirection::Maximize,
            created_at: Utc::now(),
        }
    }

    pub fn with_termination(mut self, condition: TerminationCondition) -> Self {
        self.termination.push(condition);
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn to_json(&self) -> SearchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> SearchResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build_generator(&self) -> SearchResult<Box<dyn CandidateGenerator>> {
        self.generator.build(self.space.clone())
    }

    /// A builder pre-filled from this descriptor. Only the evaluator (and
    /// optionally data, persister and listeners) remain to be added.
    pub fn config_builder(&self) -> SearchResult<OptimizationConfigBuilder> {
        let mut builder = OptimizationConfig::builder()
            .with_run_id(self.id)
            .with_name(self.name.clone())
            .with_generator(self.build_generator()?)
            .with_concurrency(self.concurrency)
            .with_direction(self.direction);
        for condition in &self.termination {
            builder = builder.with_termination(*condition);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::FnEvaluator;
    use serde_json::json;
    use sl_optimizer::{GeneticOptions, GridOptions};
    use sl_space::Node;
    use sl_types::{ParameterValue, SearchError};

    fn space() -> ParameterSpace {
        let mut b = ParameterSpace::builder();
        let lr = b.log_uniform(1e-4, 1e-1);
        let opt = b.choice(vec![json!("adam"), json!("sgd")]);
        b.build(Node::object([("learning_rate", lr), ("optimizer", opt)]))
            .unwrap()
    }

    fn evaluator() -> FnEvaluator<impl Fn(&ParameterValue) -> anyhow::Result<f64> + Send + Sync> {
        FnEvaluator::new(|_: &ParameterValue| Ok(1.0))
    }

    fn expect_config_error(result: SearchResult<OptimizationConfig>, needle: &str) {
        match result {
            Err(SearchError::Config(message)) => {
                assert!(message.contains(needle), "unexpected message: {message}")
            }
            Err(other) => panic!("expected configuration error, got {other}"),
            Ok(_) => panic!("expected configuration error"),
        }
    }

    #[test]
    fn missing_parts_are_rejected() {
        expect_config_error(
            OptimizationConfig::builder().with_evaluator(evaluator()).build(),
            "generator",
        );
        let gen = GeneratorConfig::Grid(GridOptions::default()).build(space()).unwrap();
        expect_config_error(OptimizationConfig::builder().with_generator(gen).build(), "evaluator");
    }

    #[test]
    fn unbounded_generator_needs_termination() {
        let gen = GeneratorConfig::Random { seed: Some(1) }.build(space()).unwrap();
        expect_config_error(
            OptimizationConfig::builder()
                .with_generator(gen)
                .with_evaluator(evaluator())
                .build(),
            "unbounded",
        );

        let gen = GeneratorConfig::Random { seed: Some(1) }.build(space()).unwrap();
        let config = OptimizationConfig::builder()
            .with_generator(gen)
            .with_evaluator(evaluator())
            .with_termination(TerminationCondition::max_candidates(5))
            .build()
            .unwrap();
        assert_eq!(config.concurrency(), 1);
        assert_eq!(config.termination().len(), 1);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let gen = GeneratorConfig::Grid(GridOptions::default()).build(space()).unwrap();
        expect_config_error(
            OptimizationConfig::builder()
                .with_generator(gen)
                .with_evaluator(evaluator())
                .with_concurrency(0)
                .build(),
            "concurrency",
        );
    }

    #[test]
    fn direction_mismatch_is_rejected() {
        let options = GeneticOptions::default()
            .with_direction(ObjectiveDirection::Minimize)
            .with_seed(2);
        let gen = GeneratorConfig::Genetic(options).build(space()).unwrap();
        expect_config_error(
            OptimizationConfig::builder()
                .with_generator(gen)
                .with_evaluator(evaluator())
                .with_termination(TerminationCondition::max_candidates(5))
                .build(),
            "optimizes",
        );

        let gen = GeneratorConfig::Grid(GridOptions::default()).build(space()).unwrap();
        expect_config_error(
            OptimizationConfig::builder()
                .with_generator(gen)
                .with_evaluator(evaluator())
                .with_direction(ObjectiveDirection::Minimize)
                .build(),
            "does not match",
        );
    }

    #[test]
    fn descriptor_json_roundtrip() {
        let descriptor = RunDescriptor::new(
            "lr sweep",
            space(),
            GeneratorConfig::Random { seed: Some(3) },
        )
        .with_termination(TerminationCondition::max_candidates(20))
        .with_concurrency(4);

        let json = descriptor.to_json().unwrap();
        let back = RunDescriptor::from_json(&json).unwrap();
        assert_eq!(back, descriptor);

        let config = back
            .config_builder()
            .unwrap()
            .with_evaluator(evaluator())
            .build()
            .unwrap();
        assert_eq!(config.run_id(), descriptor.id);
        assert_eq!(config.name(), "lr sweep");
        assert_eq!(config.concurrency(), 4);
    }

    #[test]
    fn descriptor_with_numeric_and_object_choices_roundtrips() {
        let mut b = ParameterSpace::builder();
        let batch = b.choice(vec![json!(32), json!(64), json!(128)]);
        let schedule = b.choice(vec![
            json!({"kind": "step", "gamma": 0.5}),
            json!({"kind": "cosine", "warmup": [1, 2]}),
            json!(null),
        ]);
        let space = b
            .build(Node::object([("batch", batch), ("schedule", schedule)]))
            .unwrap();
        let descriptor = RunDescriptor::new("choices", space, GeneratorConfig::Random { seed: None })
            .with_termination(TerminationCondition::max_candidates(3));

        let back = RunDescriptor::from_json(&descriptor.to_json().unwrap()).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn malformed_descriptor_is_a_serialization_error() {
        let err = RunDescriptor::from_json(r#"{"name": 3}"#).unwrap_err();
        assert!(matches!(err, SearchError::Serialization(_)));
    }
}
