//! Index assignment: one slice of the global vector per unique leaf.

use sl_types::SpaceError;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::space::{LeafId, ParameterSpace};

/// Identity-based de-duplication preserving first-seen order.
pub fn deduplicate(leaves: &[LeafId]) -> Vec<LeafId> {
    let mut seen = HashSet::with_capacity(leaves.len());
    leaves.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Maps every unique leaf of a space to its positions in `[0, N)`.
///
/// Once assigned the index is immutable; assigning again with the same
/// leaves is a no-op and anything else is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceIndex {
    order: Vec<LeafId>,
    ranges: HashMap<LeafId, Range<usize>>,
    total: usize,
    assigned: bool,
}

impl SpaceIndex {
    /// An empty, unassigned index.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_space(space: &ParameterSpace) -> Result<Self, SpaceError> {
        let mut index = Self::new();
        index.assign_indices(space, &space.unique_leaves())?;
        Ok(index)
    }

    /// Allocate positions for `leaves` (already de-duplicated) with a running
    /// cursor: a leaf of dimension `d` takes the next `d` positions.
    pub fn assign_indices(
        &mut self,
        space: &ParameterSpace,
        leaves: &[LeafId],
    ) -> Result<(), SpaceError> {
        let mut ranges = HashMap::with_capacity(leaves.len());
        let mut cursor = 0usize;
        for id in leaves {
            let d = space.domain(*id)?.num_parameters();
            let range = cursor..cursor + d;
            if ranges.insert(*id, range).is_some() {
                return Err(SpaceError::IndexConflict {
                    message: format!("leaf {id} appears more than once in the assignment"),
                });
            }
            cursor += d;
        }

        if self.assigned {
            if self.order != leaves {
                return Err(SpaceError::IndexConflict {
                    message: "indices were already assigned for a different leaf order".to_string(),
                });
            }
            if let Some(id) = leaves.iter().find(|id| self.ranges.get(*id) != ranges.get(*id)) {
                return Err(SpaceError::IndexConflict {
                    message: format!("parameter count of leaf {id} changed since assignment"),
                });
            }
            return Ok(());
        }

        self.order = leaves.to_vec();
        self.ranges = ranges;
        self.total = cursor;
        self.assigned = true;
        Ok(())
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    /// Total vector length, `Σ d` over unique leaves.
    pub fn num_parameters(&self) -> usize {
        self.total
    }

    /// Unique leaves in assignment order.
    pub fn leaves(&self) -> &[LeafId] {
        &self.order
    }

    pub fn range(&self, id: LeafId) -> Result<Range<usize>, SpaceError> {
        self.ranges
            .get(&id)
            .cloned()
            .ok_or(SpaceError::IndicesNotAssigned { leaf: id.0 })
    }

    /// The single position of a one-dimensional leaf.
    pub fn scalar_index(&self, id: LeafId) -> Option<usize> {
        self.ranges
            .get(&id)
            .filter(|r| r.len() == 1)
            .map(|r| r.start)
    }
}
