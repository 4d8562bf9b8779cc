//! The parameter space arena and its node tree.

use serde::{Deserialize, Serialize};
use sl_types::{ParameterValue, SpaceError};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::domain::Domain;
use crate::index::{deduplicate, SpaceIndex};
use crate::ops::{MathOp, PairOp};

/// Largest list a [`Node::Repeat`] may decode to.
pub const MAX_REPEAT_COUNT: usize = 10_000;

/// Stable identity of a leaf: its position in the space's leaf arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeafId(pub usize);

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of the configuration tree.
///
/// Cloning a node that contains a leaf reference aliases that leaf: every copy
/// decodes from the same vector positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf { id: LeafId },
    /// Named fields, decoded into a map.
    Object { fields: Vec<(String, Node)> },
    /// Positional children, decoded into a list.
    List { items: Vec<Node> },
    /// `body` repeated `count` times. `count` must decode to an integer in
    /// `0..=MAX_REPEAT_COUNT`.
    Repeat { count: Box<Node>, body: Box<Node> },
    /// Pure function of another node's value.
    Derived { input: Box<Node>, op: MathOp },
    /// Pure function of two other nodes' values.
    Combine {
        left: Box<Node>,
        right: Box<Node>,
        op: PairOp,
    },
}

impl Node {
    pub fn leaf(id: LeafId) -> Self {
        Self::Leaf { id }
    }

    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<String>,
    {
        Self::Object {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn list(items: impl IntoIterator<Item = Node>) -> Self {
        Self::List {
            items: items.into_iter().collect(),
        }
    }

    pub fn repeat(body: Node, count: Node) -> Self {
        Self::Repeat {
            count: Box::new(count),
            body: Box::new(body),
        }
    }

    /// Derive a new node from this one.
    pub fn map(self, op: MathOp) -> Self {
        Self::Derived {
            input: Box::new(self),
            op,
        }
    }

    pub fn combine(self, other: Node, op: PairOp) -> Self {
        Self::Combine {
            left: Box::new(self),
            right: Box::new(other),
            op,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Depth-first leaf references, duplicates included.
    pub fn collect_leaves(&self, out: &mut Vec<LeafId>) {
        match self {
            Self::Leaf { id } => out.push(*id),
            Self::Object { fields } => fields.iter().for_each(|(_, n)| n.collect_leaves(out)),
            Self::List { items } => items.iter().for_each(|n| n.collect_leaves(out)),
            Self::Repeat { count, body } => {
                count.collect_leaves(out);
                body.collect_leaves(out);
            }
            Self::Derived { input, .. } => input.collect_leaves(out),
            Self::Combine { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }
}

/// Hands out leaf handles while a space is being declared.
#[derive(Debug, Default)]
pub struct SpaceBuilder {
    leaves: Vec<Domain>,
}

impl SpaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf and return a node referencing it. Clone the node to
    /// share the leaf between several fields.
    pub fn leaf(&mut self, domain: Domain) -> Node {
        self.leaves.push(domain);
        Node::leaf(LeafId(self.leaves.len() - 1))
    }

    pub fn fixed(&mut self, value: impl Into<ParameterValue>) -> Node {
        self.leaf(Domain::Fixed {
            value: value.into(),
        })
    }

    pub fn continuous(&mut self, low: f64, high: f64) -> Node {
        self.leaf(Domain::Continuous { low, high })
    }

    pub fn log_uniform(&mut self, low: f64, high: f64) -> Node {
        self.leaf(Domain::LogUniform { low, high })
    }

    pub fn integer(&mut self, low: i64, high: i64) -> Node {
        self.leaf(Domain::Integer { low, high })
    }

    pub fn discrete<I, V>(&mut self, options: I) -> Node
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>,
    {
        self.leaf(Domain::Discrete {
            options: options.into_iter().map(Into::into).collect(),
        })
    }

    /// Categorical choice over JSON values (strings, booleans, objects...).
    pub fn choice(&mut self, options: Vec<serde_json::Value>) -> Node {
        self.discrete(options)
    }

    pub fn continuous_vector(&mut self, low: f64, high: f64, len: usize) -> Node {
        self.leaf(Domain::ContinuousVector { low, high, len })
    }

    pub fn build(self, root: Node) -> Result<ParameterSpace, SpaceError> {
        ParameterSpace::new(self.leaves, root)
    }
}

#[derive(Serialize, Deserialize)]
struct SpaceParts {
    leaves: Vec<Domain>,
    root: Node,
}

/// A validated configuration space: leaf arena plus root node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpaceParts", into = "SpaceParts")]
pub struct ParameterSpace {
    leaves: Vec<Domain>,
    root: Node,
}

impl TryFrom<SpaceParts> for ParameterSpace {
    type Error = SpaceError;

    fn try_from(parts: SpaceParts) -> Result<Self, Self::Error> {
        Self::new(parts.leaves, parts.root)
    }
}

impl From<ParameterSpace> for SpaceParts {
    fn from(space: ParameterSpace) -> Self {
        Self {
            leaves: space.leaves,
            root: space.root,
        }
    }
}

impl ParameterSpace {
    pub fn builder() -> SpaceBuilder {
        SpaceBuilder::new()
    }

    /// Validate every domain and every leaf reference.
    pub fn new(leaves: Vec<Domain>, root: Node) -> Result<Self, SpaceError> {
        for (i, domain) in leaves.iter().enumerate() {
            domain.validate(i)?;
        }
        let mut referenced = Vec::new();
        root.collect_leaves(&mut referenced);
        if let Some(bad) = referenced.iter().find(|id| id.0 >= leaves.len()) {
            return Err(SpaceError::UnknownLeaf { leaf: bad.0 });
        }
        Ok(Self { leaves, root })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn domain(&self, id: LeafId) -> Result<&Domain, SpaceError> {
        self.leaves
            .get(id.0)
            .ok_or(SpaceError::UnknownLeaf { leaf: id.0 })
    }

    /// Size of the leaf arena, reachable or not.
    pub fn arena_len(&self) -> usize {
        self.leaves.len()
    }

    /// Depth-first leaf references from the root, duplicates included.
    pub fn collect_leaves(&self) -> Vec<LeafId> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }

    /// Reachable leaves, each once, in first-seen order.
    pub fn unique_leaves(&self) -> Vec<LeafId> {
        deduplicate(&self.collect_leaves())
    }

    /// Length of the vector `decode` accepts.
    pub fn num_parameters(&self) -> usize {
        self.node_parameters(&self.root)
    }

    /// Dimensionality of a subtree, counting shared leaves once.
    pub fn node_parameters(&self, node: &Node) -> usize {
        let mut leaves = Vec::new();
        node.collect_leaves(&mut leaves);
        let mut seen = HashSet::new();
        leaves
            .into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.leaves.get(id.0))
            .map(Domain::num_parameters)
            .sum()
    }

    /// Build the index for this space (collect, deduplicate, assign).
    pub fn index(&self) -> Result<SpaceIndex, SpaceError> {
        SpaceIndex::for_space(self)
    }

    /// Decode a full vector into the root value.
    pub fn decode(&self, vector: &[f64], index: &SpaceIndex) -> Result<ParameterValue, SpaceError> {
        if !index.is_assigned() {
            let leaf = self.collect_leaves().first().map(|id| id.0).unwrap_or(0);
            return Err(SpaceError::IndicesNotAssigned { leaf });
        }
        if vector.len() != index.num_parameters() {
            return Err(SpaceError::VectorLengthMismatch {
                expected: index.num_parameters(),
                actual: vector.len(),
            });
        }
        self.decode_node(&self.root, vector, index)
    }

    /// Decode one subtree against an already-validated vector.
    pub fn decode_node(
        &self,
        node: &Node,
        vector: &[f64],
        index: &SpaceIndex,
    ) -> Result<ParameterValue, SpaceError> {
        match node {
            Node::Leaf { id } => {
                let domain = self.domain(*id)?;
                let range = index.range(*id)?;
                if range.len() != domain.num_parameters() {
                    return Err(SpaceError::IndexConflict {
                        message: format!(
                            "leaf {id} has {} positions assigned but needs {}",
                            range.len(),
                            domain.num_parameters()
                        ),
                    });
                }
                let slice = vector.get(range.clone()).ok_or(SpaceError::VectorLengthMismatch {
                    expected: range.end,
                    actual: vector.len(),
                })?;
                domain.decode(slice, range.start)
            }
            Node::Object { fields } => {
                let mut out = BTreeMap::new();
                for (name, child) in fields {
                    out.insert(name.clone(), self.decode_node(child, vector, index)?);
                }
                Ok(ParameterValue::Map(out))
            }
            Node::List { items } => items
                .iter()
                .map(|child| self.decode_node(child, vector, index))
                .collect::<Result<Vec<_>, _>>()
                .map(ParameterValue::List),
            Node::Repeat { count, body } => {
                let n = self.decode_node(count, vector, index)?;
                let n = n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| SpaceError::InvalidValue {
                        message: format!("repeat count must be a non-negative integer, got {n}"),
                    })?;
                if n > MAX_REPEAT_COUNT {
                    return Err(SpaceError::InvalidValue {
                        message: format!("repeat count {n} exceeds the limit of {MAX_REPEAT_COUNT}"),
                    });
                }
                let value = self.decode_node(body, vector, index)?;
                Ok(ParameterValue::List(vec![value; n]))
            }
            Node::Derived { input, op } => {
                let value = self.decode_node(input, vector, index)?;
                op.apply(&value)
            }
            Node::Combine { left, right, op } => {
                let a = self.decode_node(left, vector, index)?;
                let b = self.decode_node(right, vector, index)?;
                op.apply(&a, &b)
            }
        }
    }
}
