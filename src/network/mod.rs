//! Power-tree graph representation and validation.
//!
//! This module provides the internal representation of a power tree. The
//! [`PowerNetwork`] struct holds every component in an arena of nodes with
//! parent and child lists, the network-wide [`NetworkMetadata`] (rails,
//! groups, load phases, the power multiplexer) and the topological order
//! the solver walks.

mod graph;
mod topology;
mod types;
mod validate;

pub use graph::{Node, PowerNetwork, RESERVED_PHASE};
pub use topology::topological_order;
pub use types::*;
pub use validate::validate_network;
