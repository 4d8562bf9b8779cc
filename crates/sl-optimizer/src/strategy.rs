//! Strategy selection by configuration value.

use serde::{Deserialize, Serialize};
use sl_space::ParameterSpace;
use sl_types::SearchResult;

use crate::generator::CandidateGenerator;
use crate::genetic::{GeneticOptions, GeneticSearchGenerator};
use crate::grid::{GridOptions, GridSearchGenerator};
use crate::random::RandomSearchGenerator;

/// Serializable description of which generator to run and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum GeneratorConfig {
    Random {
        #[serde(default)]
        seed: Option<u64>,
    },
    Grid(GridOptions),
    Genetic(GeneticOptions),
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::Random { seed: None }
    }
}

impl GeneratorConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Random { .. } => "random",
            Self::Grid(_) => "grid",
            Self::Genetic(_) => "genetic",
        }
    }

    /// Instantiate the generator over `space`.
    pub fn build(&self, space: ParameterSpace) -> SearchResult<Box<dyn CandidateGenerator>> {
        Ok(match self {
            Self::Random { seed } => Box::new(match seed {
                Some(seed) => RandomSearchGenerator::with_seed(space, *seed),
                None => RandomSearchGenerator::new(space),
            }),
            Self::Grid(options) => Box::new(GridSearchGenerator::new(space, options.clone())?),
            Self::Genetic(options) => {
                Box::new(GeneticSearchGenerator::new(space, options.clone())?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridMode;
    use sl_space::Node;

    fn space() -> ParameterSpace {
        let mut b = ParameterSpace::builder();
        let x = b.integer(0, 3);
        b.build(Node::object([("x", x)])).unwrap()
    }

    #[test]
    fn builds_each_strategy() {
        let configs = [
            GeneratorConfig::Random { seed: Some(1) },
            GeneratorConfig::Grid(GridOptions::default()),
            GeneratorConfig::Genetic(GeneticOptions::default().with_seed(1)),
        ];
        for config in configs {
            let gen = config.build(space()).unwrap();
            assert_eq!(gen.name(), config.name());
        }
    }

    #[test]
    fn grid_config_from_json() {
        let config: GeneratorConfig = serde_json::from_str(
            r#"{"strategy":"grid","discretization":3,"mode":"random_order","seed":9}"#,
        )
        .unwrap();
        match &config {
            GeneratorConfig::Grid(options) => {
                assert_eq!(options.discretization, 3);
                assert_eq!(options.mode, GridMode::RandomOrder);
            }
            other => panic!("unexpected config {other:?}"),
        }
        let mut gen = config.build(space()).unwrap();
        assert_eq!(gen.total_candidates(), Some(3));
        assert!(gen.get_candidate().is_ok());
    }

    #[test]
    fn random_is_the_default() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"strategy":"random"}"#).unwrap();
        assert_eq!(config, GeneratorConfig::default());
        let gen = config.build(space()).unwrap();
        assert_eq!(gen.total_candidates(), None);
    }

    #[test]
    fn invalid_genetic_config_fails_to_build() {
        let config = GeneratorConfig::Genetic(GeneticOptions::default().with_population_size(0));
        assert!(config.build(space()).is_err());
    }
}
