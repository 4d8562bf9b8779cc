//! # sl-runner
//!
//! Executes a Searchlight optimization: pulls candidates from a generator,
//! scores them on a worker pool, records every lifecycle transition and keeps
//! going when individual candidates fail.

pub mod config;
pub mod evaluator;
pub mod listener;
pub mod persist;
pub mod runner;
pub mod termination;

pub use config::{OptimizationConfig, OptimizationConfigBuilder, RunDescriptor};
pub use evaluator::{DataProvider, Evaluation, Evaluator, FnEvaluator, NoData};
pub use listener::{CollectingListener, RunEvent, StatusListener, DEFAULT_LISTENER_TIMEOUT};
pub use persist::{CandidateResult, InMemoryPersister, JsonFilePersister, ResultPersister};
pub use runner::{BestCandidate, OptimizationRunner, RunSummary, StopReason};
pub use termination::{RunProgress, TerminationCondition};
