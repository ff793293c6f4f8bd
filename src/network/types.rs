//! Core types for power-tree representation.

use std::collections::HashMap;
use std::fmt;

use crate::components::PhaseConfig;

/// A stable identifier for a node in the network arena.
///
/// Identifiers are never reused, so a removed node leaves a hole rather
/// than shifting later nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Index into per-node vectors.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Output rail and group label of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOptions {
    /// Name of the voltage rail at the node's output
    pub rail: Option<String>,
    /// Free-form group label for reporting
    pub group: Option<String>,
}

impl NodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rail(mut self, rail: impl Into<String>) -> Self {
        self.rail = Some(rail.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Network-wide attributes, validated on every mutation.
#[derive(Debug, Clone, Default)]
pub struct NetworkMetadata {
    /// System name
    pub name: String,
    /// Component name to node
    pub names: HashMap<String, NodeId>,
    /// Rail name to the node driving it
    pub rails: HashMap<String, NodeId>,
    /// Rail and group of each node
    pub options: HashMap<NodeId, NodeOptions>,
    /// Phase configuration of each configured node
    pub phase_conf: HashMap<NodeId, PhaseConfig>,
    /// Load phases and their durations (s), in declaration order
    pub phases: Vec<(String, f64)>,
    /// The power multiplexer, if any
    pub pmux: Option<NodeId>,
}

impl NetworkMetadata {
    /// Whether `name` is taken by a component or a rail.
    pub fn is_name_used(&self, name: &str) -> bool {
        self.names.contains_key(name) || self.rails.contains_key(name)
    }

    /// Node with the given component or rail name.
    pub fn resolve(&self, name: &str) -> Option<NodeId> {
        self.names
            .get(name)
            .or_else(|| self.rails.get(name))
            .copied()
    }

    /// Output rail of a node.
    pub fn rail(&self, id: NodeId) -> Option<&str> {
        self.options.get(&id).and_then(|o| o.rail.as_deref())
    }

    /// Group of a node.
    pub fn group(&self, id: NodeId) -> Option<&str> {
        self.options.get(&id).and_then(|o| o.group.as_deref())
    }

    /// Phase configuration of a node.
    pub fn phase_config(&self, id: NodeId) -> &PhaseConfig {
        self.phase_conf.get(&id).unwrap_or(PhaseConfig::always())
    }

    /// Total duration of one phase cycle (s).
    pub fn cycle_time(&self) -> f64 {
        self.phases.iter().map(|(_, t)| t).sum()
    }

    /// Duration of a phase.
    pub fn phase_duration(&self, phase: &str) -> Option<f64> {
        self.phases
            .iter()
            .find(|(name, _)| name == phase)
            .map(|(_, t)| *t)
    }
}
