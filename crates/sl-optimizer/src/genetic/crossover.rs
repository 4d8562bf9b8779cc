//! Crossover operators combining two parent gene vectors.

use serde::{Deserialize, Serialize};
use sl_types::{config_error, internal_error, SearchResult};

use crate::generator::RandomSource;

/// Offspring genes, plus whether they differ from the first parent.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverResult {
    pub genes: Vec<f64>,
    pub modified: bool,
}

impl CrossoverResult {
    fn unchanged(parent0: &[f64]) -> Self {
        Self {
            genes: parent0.to_vec(),
            modified: false,
        }
    }

    fn from_genes(genes: Vec<f64>, parent0: &[f64]) -> Self {
        let modified = genes.iter().zip(parent0).any(|(a, b)| a != b);
        Self { genes, modified }
    }
}

pub trait CrossoverOperator: Send {
    fn crossover(
        &self,
        parent0: &[f64],
        parent1: &[f64],
        rng: &mut dyn RandomSource,
    ) -> SearchResult<CrossoverResult>;
}

fn check_rate(name: &str, value: f64) -> SearchResult<f64> {
    if !(0.0..=1.0).contains(&value) {
        return Err(config_error!("{name} must be within [0, 1], got {value}"));
    }
    Ok(value)
}

fn check_parents(parent0: &[f64], parent1: &[f64]) -> SearchResult<()> {
    if parent0.len() != parent1.len() {
        return Err(internal_error!(
            "parents have different gene counts: {} and {}",
            parent0.len(),
            parent1.len()
        ));
    }
    Ok(())
}

/// Gate draw shared by every operator: `false` means the offspring is a copy
/// of the first parent.
fn passes_gate(rate: f64, rng: &mut dyn RandomSource) -> bool {
    rng.next_f64() < rate
}

/// Per-gene uniform crossover.
///
/// `r_i < parent_bias_factor` takes gene `i` from `parent0`, anything else
/// from `parent1`.
pub fn uniform_crossover(
    parent0: &[f64],
    parent1: &[f64],
    crossover_rate: f64,
    parent_bias_factor: f64,
    rng: &mut dyn RandomSource,
) -> SearchResult<CrossoverResult> {
    check_parents(parent0, parent1)?;
    if !passes_gate(crossover_rate, rng) {
        return Ok(CrossoverResult::unchanged(parent0));
    }
    let genes = parent0
        .iter()
        .zip(parent1)
        .map(|(a, b)| if rng.next_f64() < parent_bias_factor { *a } else { *b })
        .collect();
    Ok(CrossoverResult::from_genes(genes, parent0))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformCrossover {
    crossover_rate: f64,
    parent_bias_factor: f64,
}

impl Default for UniformCrossover {
    fn default() -> Self {
        Self {
            crossover_rate: 0.85,
            parent_bias_factor: 0.5,
        }
    }
}

impl UniformCrossover {
    pub fn new(crossover_rate: f64, parent_bias_factor: f64) -> SearchResult<Self> {
        Ok(Self {
            crossover_rate: check_rate("crossover_rate", crossover_rate)?,
            parent_bias_factor: check_rate("parent_bias_factor", parent_bias_factor)?,
        })
    }

    pub fn crossover_rate(&self) -> f64 {
        self.crossover_rate
    }

    pub fn parent_bias_factor(&self) -> f64 {
        self.parent_bias_factor
    }
}

impl CrossoverOperator for UniformCrossover {
    fn crossover(
        &self,
        parent0: &[f64],
        parent1: &[f64],
        rng: &mut dyn RandomSource,
    ) -> SearchResult<CrossoverResult> {
        uniform_crossover(
            parent0,
            parent1,
            self.crossover_rate,
            self.parent_bias_factor,
            rng,
        )
    }
}

/// Head of `parent0`, tail of `parent1`, split at a random interior point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinglePointCrossover {
    crossover_rate: f64,
}

impl SinglePointCrossover {
    pub fn new(crossover_rate: f64) -> SearchResult<Self> {
        Ok(Self {
            crossover_rate: check_rate("crossover_rate", crossover_rate)?,
        })
    }
}

impl CrossoverOperator for SinglePointCrossover {
    fn crossover(
        &self,
        parent0: &[f64],
        parent1: &[f64],
        rng: &mut dyn RandomSource,
    ) -> SearchResult<CrossoverResult> {
        check_parents(parent0, parent1)?;
        if parent0.len() < 2 || !passes_gate(self.crossover_rate, rng) {
            return Ok(CrossoverResult::unchanged(parent0));
        }
        let point = 1 + rng.next_index(parent0.len() - 1);
        let genes = parent0[..point]
            .iter()
            .chain(&parent1[point..])
            .copied()
            .collect();
        Ok(CrossoverResult::from_genes(genes, parent0))
    }
}

/// Convex blend `t * parent0 + (1 - t) * parent1` with one random `t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArithmeticCrossover {
    crossover_rate: f64,
}

impl ArithmeticCrossover {
    pub fn new(crossover_rate: f64) -> SearchResult<Self> {
        Ok(Self {
            crossover_rate: check_rate("crossover_rate", crossover_rate)?,
        })
    }
}

impl CrossoverOperator for ArithmeticCrossover {
    fn crossover(
        &self,
        parent0: &[f64],
        parent1: &[f64],
        rng: &mut dyn RandomSource,
    ) -> SearchResult<CrossoverResult> {
        check_parents(parent0, parent1)?;
        if !passes_gate(self.crossover_rate, rng) {
            return Ok(CrossoverResult::unchanged(parent0));
        }
        let t = rng.next_f64();
        let genes = parent0
            .iter()
            .zip(parent1)
            .map(|(a, b)| (t * a + (1.0 - t) * b).clamp(0.0, 1.0))
            .collect();
        Ok(CrossoverResult::from_genes(genes, parent0))
    }
}

/// Serializable choice of crossover operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrossoverKind {
    Uniform {
        crossover_rate: f64,
        parent_bias_factor: f64,
    },
    SinglePoint {
        crossover_rate: f64,
    },
    Arithmetic {
        crossover_rate: f64,
    },
}

impl Default for CrossoverKind {
    fn default() -> Self {
        let uniform = UniformCrossover::default();
        Self::Uniform {
            crossover_rate: uniform.crossover_rate,
            parent_bias_factor: uniform.parent_bias_factor,
        }
    }
}

impl CrossoverKind {
    pub fn build(self) -> SearchResult<Box<dyn CrossoverOperator>> {
        Ok(match self {
            Self::Uniform {
                crossover_rate,
                parent_bias_factor,
            } => Box::new(UniformCrossover::new(crossover_rate, parent_bias_factor)?),
            Self::SinglePoint { crossover_rate } => {
                Box::new(SinglePointCrossover::new(crossover_rate)?)
            }
            Self::Arithmetic { crossover_rate } => {
                Box::new(ArithmeticCrossover::new(crossover_rate)?)
            }
        })
    }
}
