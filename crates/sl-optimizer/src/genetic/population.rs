//! Population bookkeeping for genetic search.

use serde::{Deserialize, Serialize};
use sl_types::ObjectiveDirection;
use std::cmp::Ordering;
use tracing::debug;

use crate::generator::RandomSource;

/// A scored gene vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    /// Unit-cube vector the candidate was decoded from.
    pub genes: Vec<f64>,
    pub fitness: f64,
}

/// Observer notified after every change to the population.
pub trait PopulationListener: Send {
    fn on_changed(&mut self, population: &[Chromosome]);
}

/// The evolving set of evaluated chromosomes.
///
/// Members are kept sorted best-first for the configured direction. When an
/// insert pushes the size past `capacity` the worst members are culled.
pub struct PopulationModel {
    capacity: usize,
    direction: ObjectiveDirection,
    members: Vec<Chromosome>,
    listeners: Vec<Box<dyn PopulationListener>>,
}

impl std::fmt::Debug for PopulationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulationModel")
            .field("capacity", &self.capacity)
            .field("direction", &self.direction)
            .field("members", &self.members.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl PopulationModel {
    pub fn new(capacity: usize, direction: ObjectiveDirection) -> Self {
        Self {
            capacity,
            direction,
            members: Vec::with_capacity(capacity + 1),
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn PopulationListener>) {
        self.listeners.push(listener);
    }

    /// `Less` when `a` should rank ahead of `b`.
    fn rank(&self, a: f64, b: f64) -> Ordering {
        match self.direction {
            ObjectiveDirection::Maximize => b.total_cmp(&a),
            ObjectiveDirection::Minimize => a.total_cmp(&b),
        }
    }

    /// Insert a scored chromosome. Non-finite fitness values are rejected and
    /// leave the population untouched.
    pub fn add(&mut self, chromosome: Chromosome) -> bool {
        if !chromosome.fitness.is_finite() {
            debug!(fitness = chromosome.fitness, "ignoring non-finite fitness");
            return false;
        }
        // Ties keep insertion order.
        let pos = self
            .members
            .partition_point(|m| self.rank(m.fitness, chromosome.fitness) != Ordering::Greater);
        self.members.insert(pos, chromosome);

        if self.members.len() > self.capacity {
            let culled = self.members.len() - self.capacity;
            self.members.truncate(self.capacity);
            debug!(culled, capacity = self.capacity, "population culled");
        }

        for listener in &mut self.listeners {
            listener.on_changed(&self.members);
        }
        true
    }

    /// Members, best first.
    pub fn members(&self) -> &[Chromosome] {
        &self.members
    }

    pub fn best(&self) -> Option<&Chromosome> {
        self.members.first()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }
}

/// Supplies genes until the population has filled up.
pub trait PopulationInitializer: Send {
    /// Population size the initializer is responsible for.
    fn size(&self) -> usize;

    fn initial_genes(&mut self, len: usize, rng: &mut dyn RandomSource) -> Vec<f64>;
}

/// Uniform random genes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomPopulationInitializer {
    pub size: usize,
}

impl RandomPopulationInitializer {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl PopulationInitializer for RandomPopulationInitializer {
    fn size(&self) -> usize {
        self.size
    }

    fn initial_genes(&mut self, len: usize, rng: &mut dyn RandomSource) -> Vec<f64> {
        (0..len).map(|_| rng.next_f64()).collect()
    }
}
