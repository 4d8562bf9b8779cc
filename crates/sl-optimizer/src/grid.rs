//! Exhaustive grid search over the unit hypercube.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sl_space::{Domain, LeafId, ParameterSpace, SpaceIndex};
use sl_types::{config_error, internal_error, Candidate, SearchResult};
use std::collections::BTreeMap;
use tracing::debug;

use crate::generator::{decode_candidate, CandidateGenerator};

/// Order in which grid cells are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    /// Lexicographic, last axis varying fastest.
    #[default]
    Sequential,
    /// A seeded permutation of the sequential order, computed per cell.
    RandomOrder,
}

/// Grid search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOptions {
    /// Levels per axis for continuous positions.
    pub discretization: usize,
    pub mode: GridMode,
    /// Permutation seed for [`GridMode::RandomOrder`].
    pub seed: u64,
    /// Per-leaf level counts. Always take precedence.
    pub overrides: BTreeMap<LeafId, usize>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            discretization: 5,
            mode: GridMode::Sequential,
            seed: 0,
            overrides: BTreeMap::new(),
        }
    }
}

impl GridOptions {
    pub fn with_discretization(mut self, levels: usize) -> Self {
        self.discretization = levels;
        self
    }

    pub fn with_mode(mut self, mode: GridMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_override(mut self, leaf: LeafId, levels: usize) -> Self {
        self.overrides.insert(leaf, levels);
        self
    }
}

/// Finite generator visiting every cell of the discretized space once.
#[derive(Debug, Clone)]
pub struct GridSearchGenerator {
    space: ParameterSpace,
    index: SpaceIndex,
    /// Level count per vector position.
    levels: Vec<usize>,
    total: usize,
    /// Cell visit order; `None` means sequential.
    order: Option<CellPermutation>,
    cursor: usize,
}

impl GridSearchGenerator {
    pub fn new(space: ParameterSpace, options: GridOptions) -> SearchResult<Self> {
        if options.discretization == 0 {
            return Err(config_error!("grid discretization must be at least 1"));
        }
        let index = space.index()?;
        let levels = axis_levels(&space, &index, &options)?;

        let total = levels
            .iter()
            .try_fold(1usize, |acc, k| acc.checked_mul(*k))
            .ok_or_else(|| config_error!("grid over {} axes is too large to enumerate", levels.len()))?;

        let order = match options.mode {
            GridMode::Sequential => None,
            GridMode::RandomOrder => Some(CellPermutation::new(total, options.seed)),
        };

        debug!(
            axes = levels.len(),
            total,
            mode = ?options.mode,
            "grid search initialized"
        );

        Ok(Self {
            space,
            index,
            levels,
            total,
            order,
            cursor: 0,
        })
    }

    /// Levels per vector position, in index order.
    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    /// Unit-cube point at the center of `cell`.
    fn cell_vector(&self, mut cell: usize) -> Vec<f64> {
        let mut vector = vec![0.0; self.levels.len()];
        for (axis, k) in self.levels.iter().enumerate().rev() {
            let b = cell % k;
            cell /= k;
            vector[axis] = (b as f64 + 0.5) / *k as f64;
        }
        vector
    }
}

/// Seeded bijection on `0..total`.
///
/// A balanced Feistel network permutes the smallest even-width power of two
/// covering `total`; outputs past `total` are fed back in until one lands
/// inside the range (cycle walking). The domain is at most `4 * total`, so the
/// expected walk is short.
#[derive(Debug, Clone)]
struct CellPermutation {
    total: u64,
    half_bits: u32,
    keys: [u64; FEISTEL_ROUNDS],
}

const FEISTEL_ROUNDS: usize = 4;

impl CellPermutation {
    fn new(total: usize, seed: u64) -> Self {
        let total = total as u64;
        // half_bits <= 32, so every shift below stays in range
        let bits = u64::BITS - total.saturating_sub(1).leading_zeros();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut keys = [0u64; FEISTEL_ROUNDS];
        for key in keys.iter_mut() {
            *key = rng.gen();
        }
        Self {
            total,
            half_bits: (bits + 1) / 2,
            keys,
        }
    }

    fn permute(&self, position: usize) -> usize {
        let mut x = position as u64;
        loop {
            x = self.feistel(x);
            if x < self.total {
                return x as usize;
            }
        }
    }

    fn feistel(&self, x: u64) -> u64 {
        let h = self.half_bits;
        let mask = (1u64 << h) - 1;
        let (mut left, mut right) = (x >> h, x & mask);
        for key in &self.keys {
            let mixed = (left ^ round(right, *key)) & mask;
            left = right;
            right = mixed;
        }
        (left << h) | right
    }
}

/// splitmix64 finalizer over the half-block and round key.
fn round(half: u64, key: u64) -> u64 {
    let mut z = half.wrapping_add(key).wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn axis_levels(
    space: &ParameterSpace,
    index: &SpaceIndex,
    options: &GridOptions,
) -> SearchResult<Vec<usize>> {
    let mut levels = Vec::with_capacity(index.num_parameters());
    for id in index.leaves() {
        let domain = space.domain(*id)?;
        let k = match options.overrides.get(id) {
            Some(0) => {
                return Err(config_error!("grid override for leaf {id} must be at least 1"));
            }
            Some(k) => *k,
            None => match domain {
                Domain::Discrete { .. } => domain.natural_levels().unwrap_or(1),
                Domain::Integer { .. } => domain
                    .natural_levels()
                    .map_or(options.discretization, |n| n.min(options.discretization)),
                _ => options.discretization,
            },
        };
        levels.extend(std::iter::repeat(k).take(domain.num_parameters()));
    }
    Ok(levels)
}

impl CandidateGenerator for GridSearchGenerator {
    fn has_more_candidates(&self) -> bool {
        self.cursor < self.total
    }

    fn get_candidate(&mut self) -> SearchResult<Candidate> {
        if !self.has_more_candidates() {
            return Err(internal_error!(
                "grid exhausted after {} candidates",
                self.total
            ));
        }
        let id = self.cursor;
        self.cursor += 1;

        let cell = match &self.order {
            Some(order) => order.permute(id),
            None => id,
        };
        let vector = self.cell_vector(cell);
        decode_candidate(&self.space, &self.index, id, vector)
    }

    fn total_candidates(&self) -> Option<usize> {
        Some(self.total)
    }

    fn parameter_space(&self) -> &ParameterSpace {
        &self.space
    }

    fn name(&self) -> &str {
        "grid"
    }
}
