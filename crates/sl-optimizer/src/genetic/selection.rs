//! Parent selection strategies.

use serde::{Deserialize, Serialize};
use sl_types::{internal_error, SearchResult};

use super::population::Chromosome;
use crate::generator::RandomSource;

/// Picks two distinct parents from a population sorted best-first.
pub trait ParentSelection: Send {
    /// Indices into `population` of the two parents.
    fn select_parents(
        &mut self,
        population: &[Chromosome],
        rng: &mut dyn RandomSource,
    ) -> SearchResult<[usize; 2]>;
}

fn require_pair(population: &[Chromosome]) -> SearchResult<()> {
    if population.len() < 2 {
        return Err(internal_error!(
            "parent selection needs at least 2 members, population has {}",
            population.len()
        ));
    }
    Ok(())
}

/// Every member is equally likely.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSelection;

impl ParentSelection for UniformSelection {
    fn select_parents(
        &mut self,
        population: &[Chromosome],
        rng: &mut dyn RandomSource,
    ) -> SearchResult<[usize; 2]> {
        require_pair(population)?;
        let n = population.len();
        let first = rng.next_index(n);
        let mut second = rng.next_index(n - 1);
        if second >= first {
            second += 1;
        }
        Ok([first, second])
    }
}

/// Rank-weighted roulette: the member at rank `r` (0 = best) of `n` has
/// weight `n - r`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitnessWeightedSelection;

impl FitnessWeightedSelection {
    fn pick(n: usize, exclude: Option<usize>, rng: &mut dyn RandomSource) -> usize {
        let weight = |rank: usize| if Some(rank) == exclude { 0 } else { n - rank };
        let total: usize = (0..n).map(weight).sum();
        let mut target = rng.next_f64() * total as f64;
        let mut last = 0;
        for rank in 0..n {
            let w = weight(rank);
            if w == 0 {
                continue;
            }
            last = rank;
            if target < w as f64 {
                return rank;
            }
            target -= w as f64;
        }
        last
    }
}

impl ParentSelection for FitnessWeightedSelection {
    fn select_parents(
        &mut self,
        population: &[Chromosome],
        rng: &mut dyn RandomSource,
    ) -> SearchResult<[usize; 2]> {
        require_pair(population)?;
        let n = population.len();
        let first = Self::pick(n, None, rng);
        let second = Self::pick(n, Some(first), rng);
        Ok([first, second])
    }
}

/// Serializable choice of selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    #[default]
    Uniform,
    FitnessWeighted,
}

impl SelectionKind {
    pub fn build(self) -> Box<dyn ParentSelection> {
        match self {
            Self::Uniform => Box::new(UniformSelection),
            Self::FitnessWeighted => Box::new(FitnessWeightedSelection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::seeded_source;
    use crate::generator::testing::ScriptedSource;

    fn population(n: usize) -> Vec<Chromosome> {
        (0..n)
            .map(|i| Chromosome {
                genes: vec![i as f64 / n as f64],
                fitness: (n - i) as f64,
            })
            .collect()
    }

    #[test]
    fn uniform_parents_are_distinct() {
        let members = population(5);
        let mut rng = seeded_source(Some(3));
        let mut selection = UniformSelection;
        for _ in 0..200 {
            let [a, b] = selection.select_parents(&members, rng.as_mut()).unwrap();
            assert_ne!(a, b);
            assert!(a < 5 && b < 5);
        }
    }

    #[test]
    fn uniform_skips_over_first_pick() {
        // first = 2, second draws index 2 of the remaining 4 → shifted to 3
        let mut rng = ScriptedSource::new(&[0.5, 0.6]);
        let [a, b] = UniformSelection
            .select_parents(&population(5), &mut rng)
            .unwrap();
        assert_eq!((a, b), (2, 3));
    }

    #[test]
    fn weighted_prefers_better_ranks() {
        let members = population(4);
        let mut rng = seeded_source(Some(11));
        let mut selection = FitnessWeightedSelection;
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            let [a, b] = selection.select_parents(&members, rng.as_mut()).unwrap();
            assert_ne!(a, b);
            counts[a] += 1;
        }
        assert!(counts[0] > counts[1]);
        assert!(counts[1] > counts[2]);
        assert!(counts[2] > counts[3]);
    }

    #[test]
    fn weighted_pick_is_exact_on_boundaries() {
        // weights 2 and 1 over a total of 3
        let mut rng = ScriptedSource::new(&[0.0, 0.999]);
        let [a, b] = FitnessWeightedSelection
            .select_parents(&population(2), &mut rng)
            .unwrap();
        assert_eq!((a, b), (0, 1));
    }

    #[test]
    fn tiny_population_is_rejected() {
        let mut rng = seeded_source(Some(0));
        assert!(UniformSelection
            .select_parents(&population(1), rng.as_mut())
            .is_err());
        assert!(FitnessWeightedSelection
            .select_parents(&[], rng.as_mut())
            .is_err());
    }

    #[test]
    fn selection_kind_deserializes() {
        let kind: SelectionKind = serde_json::from_str(r#""fitness_weighted""#).unwrap();
        assert_eq!(kind, SelectionKind::FitnessWeighted);
    }
}
