//! Stop-the-search predicates.

use serde::{Deserialize, Serialize};
use sl_types::ObjectiveDirection;
use std::fmt;
use std::time::Duration;

/// Snapshot of run state that termination conditions are checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct RunProgress {
    /// Candidates attempted so far, including ones that failed to generate.
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub best_score: Option<f64>,
    pub direction: ObjectiveDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminationCondition {
    /// Stop once this many candidates have been attempted.
    MaxCandidates { count: usize },
    /// Stop dispatching after this much wall-clock time.
    MaxTime { seconds: f64 },
    /// Stop once the best score reaches `score` in the objective direction.
    TargetScore { score: f64 },
}

impl TerminationCondition {
    pub fn max_candidates(count: usize) -> Self {
        Self::MaxCandidates { count }
    }

    pub fn max_time(duration: Duration) -> Self {
        Self::MaxTime {
            seconds: duration.as_secs_f64(),
        }
    }

    pub fn target_score(score: f64) -> Self {
        Self::TargetScore { score }
    }

    pub fn has_met(&self, progress: &RunProgress) -> bool {
        match self {
            Self::MaxCandidates { count } => progress.total >= *count,
            Self::MaxTime { seconds } => progress.elapsed.as_secs_f64() >= *seconds,
            Self::TargetScore { score } => match progress.best_score {
                Some(best) => match progress.direction {
                    ObjectiveDirection::Maximize => best >= *score,
                    ObjectiveDirection::Minimize => best <= *score,
                },
                None => false,
            },
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            Self::MaxTime { seconds } if !seconds.is_finite() || *seconds < 0.0 => {
                Err(format!("max time must be a non-negative number of seconds, got {seconds}"))
            }
            Self::TargetScore { score } if !score.is_finite() => {
                Err(format!("target score must be finite, got {score}"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TerminationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxCandidates { count } => write!(f, "max candidates ({count})"),
            Self::MaxTime { seconds } => write!(f, "max time ({seconds}s)"),
            Self::TargetScore { score } => write!(f, "target score ({score})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress() -> RunProgress {
        RunProgress {
            total: 0,
            completed: 0,
            failed: 0,
            elapsed: Duration::ZERO,
            best_score: None,
            direction: ObjectiveDirection::Maximize,
        }
    }

    #[test]
    fn max_candidates_counts_failures() {
        let cond = TerminationCondition::max_candidates(3);
        let mut p = progress();
        p.total = 2;
        assert!(!cond.has_met(&p));
        p.total = 3;
        p.failed = 3;
        assert!(cond.has_met(&p));
    }

    #[test]
    fn max_time() {
        let cond = TerminationCondition::max_time(Duration::from_millis(1500));
        let mut p = progress();
        p.elapsed = Duration::from_secs(1);
        assert!(!cond.has_met(&p));
        p.elapsed = Duration::from_secs(2);
        assert!(cond.has_met(&p));
    }

    #[test]
    fn target_score_follows_direction() {
        let cond = TerminationCondition::target_score(0.9);
        let mut p = progress();
        assert!(!cond.has_met(&p));
        p.best_score = Some(0.95);
        assert!(cond.has_met(&p));
        p.direction = ObjectiveDirection::Minimize;
        assert!(!cond.has_met(&p));
        p.best_score = Some(0.5);
        assert!(cond.has_met(&p));
    }

    #[test]
    fn invalid_conditions() {
        assert!(TerminationCondition::MaxTime { seconds: -1.0 }.validate().is_err());
        assert!(TerminationCondition::TargetScore { score: f64::NAN }.validate().is_err());
        assert!(TerminationCondition::max_candidates(0).validate().is_ok());
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&TerminationCondition::max_candidates(10)).unwrap();
        assert_eq!(json, r#"{"type":"max_candidates","count":10}"#);
        let back: TerminationCondition =
            serde_json::from_str(r#"{"type":"max_time","seconds":2.5}"#).unwrap();
        assert_eq!(back.to_string(), "max time (2.5s)");
    }
}
