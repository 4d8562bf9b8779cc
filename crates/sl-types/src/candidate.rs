//! Candidate configurations and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::ParameterValue;

/// Whether we are maximizing or minimizing the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    /// True when `candidate` is strictly better than `incumbent`.
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }
}

/// Lifecycle state of a single candidate.
///
/// `Created → Queued → Running → {Complete | Failed}`. A candidate whose
/// generation failed moves straight from `Created` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateStatus {
    Created,
    Queued,
    Running,
    Complete,
    Failed,
}

impl CandidateStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Which stage of the pipeline a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Generation,
    Execution,
}

/// Failure detail kept on a failed candidate for later inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub message: String,
}

/// One concrete, evaluatable configuration point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Sequence number assigned by the generator (0-indexed).
    pub id: usize,
    /// The flat vector the value was decoded from.
    pub raw_vector: Vec<f64>,
    /// Decoded configuration. `None` only when generation failed.
    pub value: Option<ParameterValue>,
    pub status: CandidateStatus,
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure: Option<FailureInfo>,
    /// Set when the score was computed but saving the result failed.
    pub persist_error: Option<String>,
}

impl Candidate {
    pub fn new(id: usize, raw_vector: Vec<f64>, value: ParameterValue) -> Self {
        Self {
            id,
            raw_vector,
            value: Some(value),
            status: CandidateStatus::Created,
            score: None,
            created_at: Utc::now(),
            queued_at: None,
            started_at: None,
            completed_at: None,
            failure: None,
            persist_error: None,
        }
    }

    /// Placeholder record for a candidate that could not be generated.
    pub fn generation_failed(id: usize, message: impl Into<String>) -> Self {
        let mut candidate = Self {
            value: None,
            ..Self::new(id, Vec::new(), ParameterValue::Json(serde_json::Value::Null))
        };
        candidate.mark_failed(FailureKind::Generation, message);
        candidate
    }

    pub fn mark_queued(&mut self) {
        self.status = CandidateStatus::Queued;
        self.queued_at = Some(Utc::now());
    }

    pub fn mark_running(&mut self) {
        self.status = CandidateStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, score: f64) {
        self.status = CandidateStatus::Complete;
        self.completed_at = Some(Utc::now());
        self.score = Some(score);
    }

    pub fn mark_failed(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.status = CandidateStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.failure = Some(FailureInfo {
            kind,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_lifecycle() {
        let mut candidate = Candidate::new(0, vec![0.5], ParameterValue::Float(0.5));
        assert_eq!(candidate.status, CandidateStatus::Created);

        candidate.mark_queued();
        assert_eq!(candidate.status, CandidateStatus::Queued);
        assert!(candidate.queued_at.is_some());

        candidate.mark_running();
        assert_eq!(candidate.status, CandidateStatus::Running);
        assert!(candidate.started_at.is_some());

        candidate.mark_completed(1.8);
        assert_eq!(candidate.status, CandidateStatus::Complete);
        assert!(candidate.completed_at.is_some());
        assert_eq!(candidate.score, Some(1.8));
        assert!(candidate.status.is_terminal());
    }

    #[test]
    fn candidate_execution_failure() {
        let mut candidate = Candidate::new(1, vec![0.1], ParameterValue::Int(0));
        candidate.mark_queued();
        candidate.mark_running();
        candidate.mark_failed(FailureKind::Execution, "evaluator panicked");
        assert_eq!(candidate.status, CandidateStatus::Failed);
        let failure = candidate.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Execution);
        assert_eq!(failure.message, "evaluator panicked");
        assert!(candidate.score.is_none());
    }

    #[test]
    fn generation_failure_has_no_value() {
        let candidate = Candidate::generation_failed(4, "nOut must be positive");
        assert_eq!(candidate.id, 4);
        assert_eq!(candidate.status, CandidateStatus::Failed);
        assert!(candidate.value.is_none());
        assert!(candidate.queued_at.is_none());
        assert_eq!(
            candidate.failure.as_ref().map(|f| f.kind),
            Some(FailureKind::Generation)
        );
    }

    #[test]
    fn direction_comparisons() {
        assert!(ObjectiveDirection::Maximize.improves(2.0, 1.5));
        assert!(!ObjectiveDirection::Maximize.improves(1.0, 1.5));
        assert!(ObjectiveDirection::Minimize.improves(0.05, 0.15));
        assert_eq!(ObjectiveDirection::default(), ObjectiveDirection::Maximize);
    }

    #[test]
    fn candidate_serialization_roundtrip() {
        let mut candidate = Candidate::new(2, vec![0.25, 0.75], ParameterValue::Float(3.5));
        candidate.mark_queued();
        let json = serde_json::to_string(&candidate).unwrap();
        let back: Candidate = serde_json::from_str(&json).unwrap();
        assert_eq!(candidate, back);
    }
}
