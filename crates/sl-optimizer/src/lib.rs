//! # sl-optimizer
//!
//! Candidate generators for Searchlight.
//!
//! Every generator produces unit-cube vectors and decodes them through a
//! [`ParameterSpace`](sl_space::ParameterSpace): random sampling, exhaustive
//! grids, and genetic search with pluggable crossover, selection and
//! mutation operators.

mod generator;
pub mod genetic;
mod grid;
mod random;
mod strategy;

pub use generator::{seeded_source, CandidateGenerator, RandomSource, RngSource};
pub use genetic::crossover::{
    uniform_crossover, ArithmeticCrossover, CrossoverKind, CrossoverOperator, CrossoverResult,
    SinglePointCrossover, UniformCrossover,
};
pub use genetic::mutation::{MutationOperator, RandomMutation};
pub use genetic::population::{
    Chromosome, PopulationInitializer, PopulationListener, PopulationModel,
    RandomPopulationInitializer,
};
pub use genetic::selection::{
    FitnessWeightedSelection, ParentSelection, SelectionKind, UniformSelection,
};
pub use genetic::{GeneticOptions, GeneticSearchBuilder, GeneticSearchGenerator};
pub use grid::{GridMode, GridOptions, GridSearchGenerator};
pub use random::RandomSearchGenerator;
pub use strategy::GeneratorConfig;
