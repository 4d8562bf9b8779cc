//! Mutation operators applied to offspring genes.

use sl_types::{config_error, SearchResult};

use crate::generator::RandomSource;

pub trait MutationOperator: Send {
    /// Mutate `genes` in place. Returns `true` if any gene changed.
    fn mutate(&self, genes: &mut [f64], rng: &mut dyn RandomSource) -> bool;
}

/// Replaces each gene with a fresh uniform draw with probability `rate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomMutation {
    rate: f64,
}

impl RandomMutation {
    pub fn new(rate: f64) -> SearchResult<Self> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(config_error!("mutation rate must be within [0, 1], got {rate}"));
        }
        Ok(Self { rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl MutationOperator for RandomMutation {
    fn mutate(&self, genes: &mut [f64], rng: &mut dyn RandomSource) -> bool {
        let mut changed = false;
        for gene in genes.iter_mut() {
            if rng.next_f64() < self.rate {
                let fresh = rng.next_f64();
                changed |= fresh != *gene;
                *gene = fresh;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::seeded_source;
    use crate::generator::testing::ScriptedSource;

    #[test]
    fn zero_rate_never_mutates() {
        let op = RandomMutation::new(0.0).unwrap();
        let mut genes = vec![0.2, 0.4, 0.6];
        let mut rng = seeded_source(Some(9));
        assert!(!op.mutate(&mut genes, rng.as_mut()));
        assert_eq!(genes, vec![0.2, 0.4, 0.6]);
    }

    #[test]
    fn mutated_genes_are_redrawn() {
        let op = RandomMutation::new(0.5).unwrap();
        let mut genes = vec![0.2, 0.4];
        // gene 0: 0.1 < 0.5 → redraw 0.9; gene 1: 0.7 keeps
        let mut rng = ScriptedSource::new(&[0.1, 0.9, 0.7]);
        assert!(op.mutate(&mut genes, &mut rng));
        assert_eq!(genes, vec![0.9, 0.4]);
    }

    #[test]
    fn rate_is_validated() {
        assert!(RandomMutation::new(-0.5).is_err());
        assert!(RandomMutation::new(1.01).is_err());
        assert_eq!(RandomMutation::new(1.0).unwrap().rate(), 1.0);
    }
}
