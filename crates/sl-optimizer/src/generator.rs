//! The generator contract shared by every search strategy.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sl_space::{ParameterSpace, SpaceIndex};
use sl_types::{Candidate, ObjectiveDirection, SearchError, SearchResult};

/// Common trait for all candidate generators.
///
/// Generators hold cursor or population state, so callers must serialize
/// access (the runner keeps each generator behind a single lock).
pub trait CandidateGenerator: Send {
    /// `false` once a finite generator has emitted everything.
    fn has_more_candidates(&self) -> bool;

    /// Produce the next candidate. A `CandidateGeneration` error consumes the
    /// candidate id but leaves the generator usable.
    fn get_candidate(&mut self) -> SearchResult<Candidate>;

    /// Total number of candidates, or `None` for open-ended generators.
    fn total_candidates(&self) -> Option<usize>;

    fn parameter_space(&self) -> &ParameterSpace;

    /// Report a completed score so adaptive generators can learn.
    fn report_score(&mut self, _candidate_id: usize, _score: f64) {}

    /// Report that a candidate failed and will never be scored.
    fn report_failure(&mut self, _candidate_id: usize) {}

    /// Direction the generator optimizes for, if it cares.
    fn objective_direction(&self) -> Option<ObjectiveDirection> {
        None
    }

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Source of uniform draws in `[0, 1)`.
///
/// All search randomness goes through this trait so tests can script exact
/// sequences.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;

    /// Uniform index in `[0, bound)`. `bound` must be non-zero.
    fn next_index(&mut self, bound: usize) -> usize {
        ((self.next_f64() * bound as f64) as usize).min(bound.saturating_sub(1))
    }
}

/// Adapter from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn next_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    fn next_index(&mut self, bound: usize) -> usize {
        self.0.gen_range(0..bound)
    }
}

/// ChaCha-backed source; reproducible when a seed is given.
pub fn seeded_source(seed: Option<u64>) -> Box<dyn RandomSource> {
    let rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    Box::new(RngSource(rng))
}

/// Decode `vector` into a fresh candidate, classifying decode failures as
/// either fatal (broken space) or per-candidate.
pub(crate) fn decode_candidate(
    space: &ParameterSpace,
    index: &SpaceIndex,
    id: usize,
    vector: Vec<f64>,
) -> SearchResult<Candidate> {
    match space.decode(&vector, index) {
        Ok(value) => Ok(Candidate::new(id, vector, value)),
        Err(e) => Err(SearchError::for_candidate(e, id)),
    }
}
