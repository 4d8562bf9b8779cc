//! Independent uniform sampling across the search space.

use sl_space::{ParameterSpace, SpaceIndex};
use sl_types::{Candidate, SearchResult};
use tracing::debug;

use crate::generator::{decode_candidate, seeded_source, CandidateGenerator, RandomSource};

/// Open-ended random search.
///
/// Every call draws one uniform value per vector position. A leaf shared by
/// several fields owns a single position, so all of its uses see one draw.
pub struct RandomSearchGenerator {
    space: ParameterSpace,
    /// Computed on first use.
    index: Option<SpaceIndex>,
    rng: Box<dyn RandomSource>,
    next_id: usize,
}

impl RandomSearchGenerator {
    pub fn new(space: ParameterSpace) -> Self {
        Self::with_source(space, seeded_source(None))
    }

    pub fn with_seed(space: ParameterSpace, seed: u64) -> Self {
        Self::with_source(space, seeded_source(Some(seed)))
    }

    pub fn with_source(space: ParameterSpace, rng: Box<dyn RandomSource>) -> Self {
        Self {
            space,
            index: None,
            rng,
            next_id: 0,
        }
    }

    fn sample_vector(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.rng.next_f64()).collect()
    }
}

impl CandidateGenerator for RandomSearchGenerator {
    fn has_more_candidates(&self) -> bool {
        true
    }

    fn get_candidate(&mut self) -> SearchResult<Candidate> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                let index = self.space.index()?;
                debug!(parameters = index.num_parameters(), "random search index assigned");
                index
            }
        };

        let id = self.next_id;
        self.next_id += 1;

        let vector = self.sample_vector(index.num_parameters());
        let candidate = decode_candidate(&self.space, &index, id, vector);
        self.index = Some(index);
        candidate
    }

    fn total_candidates(&self) -> Option<usize> {
        None
    }

    fn parameter_space(&self) -> &ParameterSpace {
        &self.space
    }

    fn name(&self) -> &str {
        "random"
    }
}
