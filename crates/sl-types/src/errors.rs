use thiserror::Error;

/// Main error type for the Searchlight system
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Space error: {0}")]
    Space(#[from] SpaceError),

    /// Malformed setup detected before or while searching. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The space decoded to a configuration that cannot be used.
    #[error("Candidate {id} generation failed: {message}")]
    CandidateGeneration { id: usize, message: String },

    /// The evaluator failed on a valid configuration.
    #[error("Candidate {id} execution failed: {message}")]
    CandidateExecution { id: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Whether this error must end the search rather than a single candidate.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::CandidateGeneration { .. } | Self::CandidateExecution { .. } => false,
            Self::Space(e) => e.is_structural(),
            _ => true,
        }
    }

    /// Re-tag a value-level space error as a per-candidate generation failure.
    /// Structural errors are returned unchanged.
    pub fn for_candidate(err: SpaceError, id: usize) -> Self {
        if err.is_structural() {
            Self::Space(err)
        } else {
            Self::CandidateGeneration {
                id,
                message: err.to_string(),
            }
        }
    }
}

/// Parameter space errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpaceError {
    #[error("Indices have not been assigned for leaf {leaf}")]
    IndicesNotAssigned { leaf: usize },

    #[error("Vector length mismatch: expected {expected}, got {actual}")]
    VectorLengthMismatch { expected: usize, actual: usize },

    #[error("Conflicting index assignment: {message}")]
    IndexConflict { message: String },

    #[error("Unknown leaf id: {leaf}")]
    UnknownLeaf { leaf: usize },

    #[error("Invalid domain for leaf {leaf}: {message}")]
    InvalidDomain { leaf: usize, message: String },

    #[error("Vector entry {value} at position {position} is outside [0, 1]")]
    ValueOutOfRange { position: usize, value: f64 },

    #[error("Invalid decoded value: {message}")]
    InvalidValue { message: String },
}

impl SpaceError {
    /// Structural errors describe a broken space or index; the rest describe
    /// one bad vector or one bad decoded value.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::ValueOutOfRange { .. } | Self::InvalidValue { .. }
        )
    }
}

/// Result type alias for Searchlight operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::SearchError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::SearchError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SpaceError::VectorLengthMismatch {
            expected: 4,
            actual: 3,
        };

        assert!(error.to_string().contains("expected 4"));
        assert!(error.to_string().contains("got 3"));
    }

    #[test]
    fn test_error_conversion() {
        let space_error = SpaceError::UnknownLeaf { leaf: 7 };
        let err: SearchError = space_error.into();

        match err {
            SearchError::Space(SpaceError::UnknownLeaf { leaf: 7 }) => (),
            _ => panic!("Expected Space error"),
        }
    }

    #[test]
    fn test_fatality() {
        assert!(config_error!("missing generator").is_fatal());
        assert!(SearchError::Space(SpaceError::IndicesNotAssigned { leaf: 0 }).is_fatal());
        assert!(!SearchError::CandidateExecution {
            id: 3,
            message: "oom".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_for_candidate_keeps_structural_errors() {
        let structural = SearchError::for_candidate(SpaceError::UnknownLeaf { leaf: 1 }, 5);
        assert!(structural.is_fatal());

        let value_level = SearchError::for_candidate(
            SpaceError::InvalidValue {
                message: "division by zero".into(),
            },
            5,
        );
        match value_level {
            SearchError::CandidateGeneration { id, message } => {
                assert_eq!(id, 5);
                assert!(message.contains("division by zero"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_macros() {
        let _internal_err = internal_error!("Something went wrong");
        let _config_err = config_error!("Missing required field: {}", "generator");
    }
}
