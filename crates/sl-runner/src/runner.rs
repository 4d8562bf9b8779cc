//! The optimization loop: generate, dispatch, collect, repeat.

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sl_optimizer::CandidateGenerator;
use sl_types::{
    internal_error, Candidate, CandidateStatus, FailureKind, ObjectiveDirection, ParameterValue,
    SearchError, SearchResult,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OptimizationConfig;
use crate::evaluator::{DataProvider, Evaluation, Evaluator};
use crate::listener::{EventDispatcher, EventSink, RunEvent, StatusListener};
use crate::persist::{CandidateResult, ResultPersister};
use crate::termination::{RunProgress, TerminationCondition};

/// How long the scheduler waits on a full pool before re-checking time limits.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Best candidate seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCandidate {
    pub id: usize,
    pub score: f64,
    pub value: Option<ParameterValue>,
}

/// Why the runner stopped dispatching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    ConditionMet { condition: TerminationCondition },
    GeneratorExhausted,
}

/// Final tally of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub name: String,
    pub completed: usize,
    pub failed: usize,
    /// Candidates left non-terminal. Zero unless the run was aborted.
    pub queued: usize,
    pub total: usize,
    pub best: Option<BestCandidate>,
    pub elapsed_secs: f64,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RunCounters {
    total: usize,
    completed: usize,
    failed: usize,
    best: Option<BestCandidate>,
}

/// Worker → scheduler message.
struct Completion {
    id: usize,
    result: Result<Evaluation, String>,
}

/// Drives one optimization run over a bounded worker pool.
///
/// The calling thread is the scheduler: it owns generation, bookkeeping and
/// termination checks, while evaluations run on a `rayon` pool of
/// `concurrency` threads. A failing candidate (undecodable configuration,
/// evaluator error or panic) is recorded and the run continues.
pub struct OptimizationRunner {
    run_id: Uuid,
    name: String,
    generator: Mutex<Box<dyn CandidateGenerator>>,
    evaluator: Arc<dyn Evaluator>,
    data: Arc<dyn DataProvider>,
    persister: Option<Arc<dyn ResultPersister>>,
    termination: Vec<TerminationCondition>,
    concurrency: usize,
    listeners: Vec<Box<dyn StatusListener>>,
    listener_timeout: Duration,
    candidates: Arc<DashMap<usize, Candidate>>,
    counters: Mutex<RunCounters>,
    executed: bool,
}

impl OptimizationRunner {
    pub fn new(config: OptimizationConfig) -> Self {
        Self {
            run_id: config.run_id,
            name: config.name,
            generator: Mutex::new(config.generator),
            evaluator: config.evaluator,
            data: config.data,
            persister: config.persister,
            termination: config.termination,
            concurrency: config.concurrency,
            listeners: config.listeners,
            listener_timeout: config.listener_timeout,
            candidates: Arc::new(DashMap::new()),
            counters: Mutex::new(RunCounters::default()),
            executed: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Snapshot of one candidate record.
    pub fn candidate(&self, id: usize) -> Option<Candidate> {
        self.candidates.get(&id).map(|c| c.value().clone())
    }

    /// Every candidate record, ordered by id.
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = self.candidates.iter().map(|c| c.value().clone()).collect();
        out.sort_by_key(|c| c.id);
        out
    }

    fn direction(&self) -> ObjectiveDirection {
        self.evaluator.direction()
    }

    fn progress(&self, elapsed: Duration) -> RunProgress {
        let counters = self.counters.lock();
        RunProgress {
            total: counters.total,
            completed: counters.completed,
            failed: counters.failed,
            elapsed,
            best_score: counters.best.as_ref().map(|b| b.score),
            direction: self.direction(),
        }
    }

    /// Run to completion. Returns `Err` only for configuration problems
    /// discovered mid-run; per-candidate failures are part of the summary.
    pub fn execute(&mut self) -> SearchResult<RunSummary> {
        if self.executed {
            return Err(internal_error!("run {} has already been executed", self.run_id));
        }
        self.executed = true;

        let concurrency = self.concurrency;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("sl-worker-{i}"))
            .build()
            .map_err(|e| internal_error!("failed to build worker pool: {e}"))?;

        let listeners = std::mem::take(&mut self.listeners);
        let events = EventDispatcher::start(listeners, self.listener_timeout);
        let (done_tx, done_rx) = unbounded::<Completion>();

        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            run_id = %self.run_id,
            name = %self.name,
            generator = %self.generator.lock().name(),
            concurrency,
            "optimization run started"
        );
        events.emit(RunEvent::RunStarted {
            run_id: self.run_id,
            name: self.name.clone(),
        });

        let mut in_flight = 0usize;
        let outcome = loop {
            while let Ok(done) = done_rx.try_recv() {
                in_flight -= 1;
                self.handle_completion(done, &events);
            }

            let progress = self.progress(start.elapsed());
            if let Some(condition) = self.termination.iter().find(|c| c.has_met(&progress)) {
                info!(condition = %condition, "termination condition met");
                break Ok(StopReason::ConditionMet {
                    condition: *condition,
                });
            }

            if in_flight >= concurrency {
                self.wait_for_completion(&done_rx, &mut in_flight, &events, Some(POLL_INTERVAL))?;
                continue;
            }

            let generated = {
                let mut generator = self.generator.lock();
                if generator.has_more_candidates() {
                    Some(generator.get_candidate())
                } else {
                    None
                }
            };

            match generated {
                None if in_flight == 0 => {
                    info!("generator exhausted");
                    break Ok(StopReason::GeneratorExhausted);
                }
                None => {
                    self.wait_for_completion(&done_rx, &mut in_flight, &events, Some(POLL_INTERVAL))?;
                }
                Some(Ok(candidate)) => {
                    self.dispatch(candidate, &pool, &done_tx, &events);
                    in_flight += 1;
                }
                Some(Err(SearchError::CandidateGeneration { id, message })) => {
                    self.record_generation_failure(id, message, &events);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "aborting run on configuration error");
                    break Err(e);
                }
            }
        };

        // Termination stops dispatch only; in-flight work still lands.
        while in_flight > 0 {
            self.wait_for_completion(&done_rx, &mut in_flight, &events, None)?;
        }

        let stop_reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                events.finish();
                return Err(e);
            }
        };

        let summary = self.summary(started_at, start.elapsed(), stop_reason);
        info!(
            run_id = %summary.run_id,
            completed = summary.completed,
            failed = summary.failed,
            total = summary.total,
            best = ?summary.best.as_ref().map(|b| b.score),
            elapsed_secs = summary.elapsed_secs,
            "optimization run finished"
        );
        events.emit(RunEvent::RunFinished {
            summary: summary.clone(),
        });
        events.finish();
        Ok(summary)
    }

    fn wait_for_completion(
        &self,
        done_rx: &Receiver<Completion>,
        in_flight: &mut usize,
        events: &EventDispatcher,
        timeout: Option<Duration>,
    ) -> SearchResult<()> {
        let received = match timeout {
            Some(timeout) => match done_rx.recv_timeout(timeout) {
                Ok(done) => Some(done),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(internal_error!("worker channel closed unexpectedly"))
                }
            },
            None => Some(
                done_rx
                    .recv()
                    .map_err(|_| internal_error!("worker channel closed unexpectedly"))?,
            ),
        };
        if let Some(done) = received {
            *in_flight -= 1;
            self.handle_completion(done, events);
        }
        Ok(())
    }

    fn record_generation_failure(&self, id: usize, message: String, events: &EventDispatcher) {
        warn!(candidate_id = id, error = %message, "candidate generation failed");
        let candidate = Candidate::generation_failed(id, message);
        let failure = candidate.failure.clone();
        self.candidates.insert(id, candidate);
        {
            let mut counters = self.counters.lock();
            counters.total += 1;
            counters.failed += 1;
        }
        self.generator.lock().report_failure(id);

        events.emit(RunEvent::status(id, CandidateStatus::Created));
        events.emit(RunEvent::CandidateStatusChanged {
            id,
            status: CandidateStatus::Failed,
            score: None,
            failure,
        });
    }

    fn dispatch(
        &self,
        mut candidate: Candidate,
        pool: &rayon::ThreadPool,
        done_tx: &Sender<Completion>,
        events: &EventDispatcher,
    ) {
        let id = candidate.id;
        // Generators always attach a value on success.
        let value = candidate.value.clone().unwrap_or(ParameterValue::Json(serde_json::Value::Null));
        candidate.mark_queued();
        self.candidates.insert(id, candidate);
        self.counters.lock().total += 1;

        events.emit(RunEvent::status(id, CandidateStatus::Created));
        events.emit(RunEvent::status(id, CandidateStatus::Queued));
        debug!(candidate_id = id, "candidate dispatched");

        let candidates = Arc::clone(&self.candidates);
        let evaluator = Arc::clone(&self.evaluator);
        let data = Arc::clone(&self.data);
        let sink: EventSink = events.sink();
        let done_tx = done_tx.clone();

        pool.spawn(move || {
            if let Some(mut record) = candidates.get_mut(&id) {
                record.mark_running();
            }
            sink.emit(RunEvent::status(id, CandidateStatus::Running));

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(&value, data.as_ref())));
            let result = match outcome {
                Ok(Ok(evaluation)) if evaluation.score.is_finite() => Ok(evaluation),
                Ok(Ok(evaluation)) => Err(format!(
                    "evaluator returned a non-finite score ({})",
                    evaluation.score
                )),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(panic) => Err(format!("evaluator panicked: {}", panic_message(&*panic))),
            };
            // The scheduler only hangs up after every in-flight result arrives.
            let _ = done_tx.send(Completion { id, result });
        });
    }

    fn handle_completion(&self, done: Completion, events: &EventDispatcher) {
        let Completion { id, result } = done;
        match result {
            Ok(evaluation) => self.complete(id, evaluation, events),
            Err(message) => {
                warn!(candidate_id = id, error = %message, "candidate execution failed");
                let failure = self.candidates.get_mut(&id).and_then(|mut record| {
                    record.mark_failed(FailureKind::Execution, message);
                    record.failure.clone()
                });
                self.counters.lock().failed += 1;
                self.generator.lock().report_failure(id);
                events.emit(RunEvent::CandidateStatusChanged {
                    id,
                    status: CandidateStatus::Failed,
                    score: None,
                    failure,
                });
            }
        }
    }

    fn complete(&self, id: usize, evaluation: Evaluation, events: &EventDispatcher) {
        let Evaluation { score, artifact } = evaluation;
        let snapshot = self.candidates.get_mut(&id).map(|mut record| {
            record.mark_completed(score);
            record.clone()
        });

        if let (Some(persister), Some(candidate)) = (&self.persister, snapshot.as_ref()) {
            let result = CandidateResult {
                candidate: candidate.clone(),
                artifact,
            };
            if let Err(e) = persister.save(id, &result) {
                warn!(candidate_id = id, error = %format!("{e:#}"), "failed to persist result");
                if let Some(mut record) = self.candidates.get_mut(&id) {
                    record.persist_error = Some(format!("{e:#}"));
                }
            }
        }

        {
            let direction = self.direction();
            let mut counters = self.counters.lock();
            counters.completed += 1;
            let improved = counters
                .best
                .as_ref()
                .map_or(true, |best| direction.improves(score, best.score));
            if improved {
                debug!(candidate_id = id, score, "new best candidate");
                counters.best = Some(BestCandidate {
                    id,
                    score,
                    value: snapshot.and_then(|c| c.value),
                });
            }
        }

        self.generator.lock().report_score(id, score);
        events.emit(RunEvent::CandidateStatusChanged {
            id,
            status: CandidateStatus::Complete,
            score: Some(score),
            failure: None,
        });
    }

    fn summary(
        &self,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        stop_reason: StopReason,
    ) -> RunSummary {
        let counters = self.counters.lock();
        let queued = self
            .candidates
            .iter()
            .filter(|c| !c.status.is_terminal())
            .count();
        RunSummary {
            run_id: self.run_id,
            name: self.name.clone(),
            completed: counters.completed,
            failed: counters.failed,
            queued,
            total: counters.total,
            best: counters.best.clone(),
            elapsed_secs: elapsed.as_secs_f64(),
            stop_reason,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
