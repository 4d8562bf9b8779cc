//! Genetic search: a population of scored gene vectors bred by crossover.
//!
//! Genes are the unit-cube vectors that candidates decode from, so any
//! parameter space can be searched without knowing its structure.

pub mod crossover;
pub mod mutation;
pub mod population;
pub mod selection;

use serde::{Deserialize, Serialize};
use sl_space::{ParameterSpace, SpaceIndex};
use sl_types::{config_error, Candidate, ObjectiveDirection, SearchResult};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::generator::{decode_candidate, seeded_source, CandidateGenerator, RandomSource};
use crossover::{CrossoverKind, CrossoverOperator, UniformCrossover};
use mutation::{MutationOperator, RandomMutation};
use population::{
    Chromosome, PopulationInitializer, PopulationListener, PopulationModel,
    RandomPopulationInitializer,
};
use selection::{ParentSelection, SelectionKind, UniformSelection};

/// Serializable genetic search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticOptions {
    pub population_size: usize,
    pub direction: ObjectiveDirection,
    pub crossover: CrossoverKind,
    pub selection: SelectionKind,
    /// Per-gene mutation probability; `0.0` disables mutation.
    pub mutation_rate: f64,
    pub seed: Option<u64>,
}

impl Default for GeneticOptions {
    fn default() -> Self {
        Self {
            population_size: 30,
            direction: ObjectiveDirection::Maximize,
            crossover: CrossoverKind::default(),
            selection: SelectionKind::default(),
            mutation_rate: 0.0,
            seed: None,
        }
    }
}

impl GeneticOptions {
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_crossover(mut self, crossover: CrossoverKind) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn with_selection(mut self, selection: SelectionKind) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Assembles a [`GeneticSearchGenerator`] from individual operators.
pub struct GeneticSearchBuilder {
    space: ParameterSpace,
    population_size: usize,
    direction: ObjectiveDirection,
    initializer: Option<Box<dyn PopulationInitializer>>,
    selection: Box<dyn ParentSelection>,
    crossover: Box<dyn CrossoverOperator>,
    mutation: Option<Box<dyn MutationOperator>>,
    listeners: Vec<Box<dyn PopulationListener>>,
    rng: Option<Box<dyn RandomSource>>,
}

impl GeneticSearchBuilder {
    fn new(space: ParameterSpace) -> Self {
        Self {
            space,
            population_size: GeneticOptions::default().population_size,
            direction: ObjectiveDirection::default(),
            initializer: None,
            selection: Box::new(UniformSelection),
            crossover: Box::new(UniformCrossover::default()),
            mutation: None,
            listeners: Vec::new(),
            rng: None,
        }
    }

    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Defaults to a [`RandomPopulationInitializer`] of `population_size`.
    pub fn initializer(mut self, initializer: Box<dyn PopulationInitializer>) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn selection(mut self, selection: Box<dyn ParentSelection>) -> Self {
        self.selection = selection;
        self
    }

    pub fn crossover(mut self, crossover: Box<dyn CrossoverOperator>) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn mutation(mut self, mutation: Box<dyn MutationOperator>) -> Self {
        self.mutation = Some(mutation);
        self
    }

    pub fn listener(mut self, listener: Box<dyn PopulationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = Some(seeded_source(Some(seed)));
        self
    }

    pub fn random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn build(self) -> SearchResult<GeneticSearchGenerator> {
        if self.population_size < 2 {
            return Err(config_error!(
                "population size must be at least 2, got {}",
                self.population_size
            ));
        }
        let initializer = self
            .initializer
            .unwrap_or_else(|| Box::new(RandomPopulationInitializer::new(self.population_size)));
        if initializer.size() < 2 || initializer.size() > self.population_size {
            return Err(config_error!(
                "initializer size {} must be within [2, {}]",
                initializer.size(),
                self.population_size
            ));
        }

        let index = self.space.index()?;
        let mut population = PopulationModel::new(self.population_size, self.direction);
        for listener in self.listeners {
            population.add_listener(listener);
        }

        debug!(
            population_size = self.population_size,
            genes = index.num_parameters(),
            direction = ?self.direction,
            "genetic search initialized"
        );

        Ok(GeneticSearchGenerator {
            space: self.space,
            index,
            population,
            initializer,
            selection: self.selection,
            crossover: self.crossover,
            mutation: self.mutation,
            rng: self.rng.unwrap_or_else(|| seeded_source(None)),
            pending: HashMap::new(),
            next_id: 0,
        })
    }
}

/// Open-ended generator that breeds new candidates from the best scored ones.
///
/// Until the population has filled, candidates come from the initializer.
/// Genes of every emitted candidate are held until its score (or failure)
/// is reported.
pub struct GeneticSearchGenerator {
    space: ParameterSpace,
    index: SpaceIndex,
    population: PopulationModel,
    initializer: Box<dyn PopulationInitializer>,
    selection: Box<dyn ParentSelection>,
    crossover: Box<dyn CrossoverOperator>,
    mutation: Option<Box<dyn MutationOperator>>,
    rng: Box<dyn RandomSource>,
    pending: HashMap<usize, Vec<f64>>,
    next_id: usize,
}

impl GeneticSearchGenerator {
    pub fn builder(space: ParameterSpace) -> GeneticSearchBuilder {
        GeneticSearchBuilder::new(space)
    }

    pub fn new(space: ParameterSpace, options: GeneticOptions) -> SearchResult<Self> {
        let mut builder = Self::builder(space)
            .population_size(options.population_size)
            .direction(options.direction)
            .selection(options.selection.build())
            .crossover(options.crossover.build()?);
        if options.mutation_rate != 0.0 {
            builder = builder.mutation(Box::new(RandomMutation::new(options.mutation_rate)?));
        }
        if let Some(seed) = options.seed {
            builder = builder.seed(seed);
        }
        builder.build()
    }

    pub fn population(&self) -> &PopulationModel {
        &self.population
    }

    /// Candidates emitted but not yet reported.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn breed(&mut self) -> SearchResult<Vec<f64>> {
        let members = self.population.members();
        let [a, b] = self.selection.select_parents(members, self.rng.as_mut())?;
        let mut offspring =
            self.crossover
                .crossover(&members[a].genes, &members[b].genes, self.rng.as_mut())?;
        if let Some(mutation) = &self.mutation {
            offspring.modified |= mutation.mutate(&mut offspring.genes, self.rng.as_mut());
        }
        trace!(parents = ?[a, b], modified = offspring.modified, "offspring bred");
        Ok(offspring.genes)
    }
}

impl CandidateGenerator for GeneticSearchGenerator {
    fn has_more_candidates(&self) -> bool {
        true
    }

    fn get_candidate(&mut self) -> SearchResult<Candidate> {
        let genes = if self.population.len() < self.initializer.size() {
            self.initializer
                .initial_genes(self.index.num_parameters(), self.rng.as_mut())
        } else {
            self.breed()?
        };

        let id = self.next_id;
        self.next_id += 1;

        let candidate = decode_candidate(&self.space, &self.index, id, genes.clone())?;
        self.pending.insert(id, genes);
        Ok(candidate)
    }

    fn total_candidates(&self) -> Option<usize> {
        None
    }

    fn parameter_space(&self) -> &ParameterSpace {
        &self.space
    }

    fn report_score(&mut self, candidate_id: usize, score: f64) {
        match self.pending.remove(&candidate_id) {
            Some(genes) => {
                self.population.add(Chromosome {
                    genes,
                    fitness: score,
                });
            }
            None => debug!(candidate_id, "score reported for unknown candidate"),
        }
    }

    fn report_failure(&mut self, candidate_id: usize) {
        self.pending.remove(&candidate_id);
    }

    fn objective_direction(&self) -> Option<ObjectiveDirection> {
        Some(self.population.direction())
    }

    fn name(&self) -> &str {
        "genetic"
    }
}
