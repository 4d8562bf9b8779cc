//! # sl-space
//!
//! Declarative parameter spaces for Searchlight.
//!
//! A [`ParameterSpace`] is an arena of leaf [`Domain`]s plus a tree of
//! [`Node`]s that reference them. The same leaf may be referenced from several
//! places in the tree; a [`SpaceIndex`] gives every unique leaf one slice of a
//! flat `[0, 1]` vector, and [`ParameterSpace::decode`] turns such a vector into
//! a structured [`ParameterValue`](sl_types::ParameterValue).

mod domain;
mod index;
mod ops;
mod space;

pub use domain::Domain;
pub use index::{deduplicate, SpaceIndex};
pub use ops::{MathOp, PairOp};
pub use space::{LeafId, Node, ParameterSpace, SpaceBuilder, MAX_REPEAT_COUNT};
