//! Power-tree graph structure.

use std::collections::HashSet;

use super::topology::topological_order;
use super::types::{NetworkMetadata, NodeId, NodeOptions};
use crate::components::{
    Component, ComponentKind, Limits, PMux, PhaseConfig, PowerComponent, Source, MAX_INPUTS,
};
use crate::dsl::NetlistAst;
use crate::error::{PowerTreeError, Result};

/// Reserved phase name.
pub const RESERVED_PHASE: &str = "N/A";

/// A component placed in the network.
#[derive(Debug, Clone)]
pub struct Node {
    pub component: Component,
    /// Parents in priority order (several only for the PMux)
    pub parents: Vec<NodeId>,
    pub children: Vec<NodeId>,
}

/// A power tree ready for analysis.
///
/// Nodes live in an arena indexed by [`NodeId`]. Every mutation is validated
/// and recomputes the topological order, so the network is always a
/// well-formed DAG between calls.
#[derive(Debug, Clone)]
pub struct PowerNetwork {
    nodes: Vec<Option<Node>>,
    meta: NetworkMetadata,
    order: Vec<NodeId>,
}

impl PowerNetwork {
    /// Create a network with its first source.
    pub fn new(name: impl Into<String>, source: Source, opts: NodeOptions) -> Result<Self> {
        let mut net = Self {
            nodes: Vec::new(),
            meta: NetworkMetadata {
                name: name.into(),
                ..NetworkMetadata::default()
            },
            order: Vec::new(),
        };
        net.add_source(source, opts)?;
        Ok(net)
    }

    /// Build a network from a parsed netlist.
    pub fn from_ast(ast: NetlistAst) -> Result<Self> {
        let mut defs = ast.components.iter();
        let first = defs.next().ok_or_else(|| PowerTreeError::topology("netlist has no components"))?;
        let source = match Component::from_def(first, &ast.tables)? {
            Component::Source(s) => s,
            other => {
                return Err(PowerTreeError::topology(format!(
                    "first component '{}' must be a SOURCE, got {}",
                    other.name(),
                    other.kind()
                )))
            }
        };
        let name = ast.name.clone().unwrap_or_else(|| "System".to_string());
        let mut net = Self::new(name, source, options_of(first))?;

        for def in defs {
            let component = Component::from_def(def, &ast.tables)?;
            let opts = options_of(def);
            match component {
                Component::Source(s) => {
                    net.add_source(s, opts)?;
                }
                Component::PMux(mux) => {
                    let parents: Vec<&str> = def.parents.iter().map(String::as_str).collect();
                    net.add_mux(&parents, mux, opts)?;
                }
                other => {
                    let parent = def.parents.first().ok_or_else(|| {
                        PowerTreeError::invalid_component(&def.name, def.line, "missing 'parent'")
                    })?;
                    net.add_component(parent, other, opts)?;
                }
            }
        }

        if !ast.phases.is_empty() {
            net.set_phases(ast.phases)?;
        }
        for conf in ast.phase_configs {
            net.set_component_phases(&conf.component, conf.config)?;
        }
        for lim in ast.limits {
            let mut limits = net.component(&lim.component)?.limits().clone();
            for (metric, min, max) in lim.ranges {
                limits.set(metric, min, max);
            }
            net.set_limits(&lim.component, limits)?;
        }

        tracing::debug!(
            system = %net.meta.name,
            components = net.len(),
            phases = net.meta.phases.len(),
            "network built from netlist"
        );
        Ok(net)
    }

    /// Add another source (a new subsystem root).
    pub fn add_source(&mut self, source: Source, opts: NodeOptions) -> Result<NodeId> {
        let component = Component::Source(source);
        component.validate()?;
        self.check_names(component.name(), opts.rail.as_deref())?;
        let id = self.insert(component, Vec::new(), opts);
        self.rebuild()?;
        Ok(id)
    }

    /// Add a component below a parent, named by component or rail.
    pub fn add_component(
        &mut self,
        parent: &str,
        component: impl Into<Component>,
        opts: NodeOptions,
    ) -> Result<NodeId> {
        let component = component.into();
        if component.kind() == ComponentKind::PMux {
            return Err(PowerTreeError::topology(format!(
                "power multiplexer '{}' must be added with its inputs",
                component.name()
            )));
        }
        component.validate()?;
        let pid = self.resolve(parent)?;
        self.check_child(pid, &component)?;
        self.check_names(component.name(), opts.rail.as_deref())?;
        let opts = self.load_options(&component, opts);

        let id = self.insert(component, vec![pid], opts);
        self.node_mut(pid)?.children.push(id);
        self.rebuild()?;
        Ok(id)
    }

    /// Add the power multiplexer with 2 to 4 parents in priority order.
    pub fn add_mux(&mut self, parents: &[&str], pmux: PMux, opts: NodeOptions) -> Result<NodeId> {
        if let Some(existing) = self.meta.pmux {
            return Err(PowerTreeError::MultipleMux {
                existing: self.node(existing).map(|n| n.component.name().to_string()).unwrap_or_default(),
            });
        }
        if parents.len() < 2 || parents.len() > MAX_INPUTS {
            return Err(PowerTreeError::topology(format!(
                "power multiplexer '{}' needs 2 to {} inputs, got {}",
                pmux.name,
                MAX_INPUTS,
                parents.len()
            )));
        }
        let component = Component::PMux(pmux);
        component.validate()?;

        let mut pids = Vec::with_capacity(parents.len());
        for parent in parents {
            let pid = self.resolve(parent)?;
            if pids.contains(&pid) {
                return Err(PowerTreeError::topology(format!(
                    "power multiplexer '{}' is connected twice to '{}'",
                    component.name(),
                    parent
                )));
            }
            self.check_child(pid, &component)?;
            pids.push(pid);
        }
        self.check_names(component.name(), opts.rail.as_deref())?;

        let id = self.insert(component, pids.clone(), opts);
        for pid in pids {
            self.node_mut(pid)?.children.push(id);
        }
        self.meta.pmux = Some(id);
        self.rebuild()?;
        Ok(id)
    }

    /// Replace a component, keeping its connections.
    ///
    /// The new component may have a different name and kind as long as the
    /// parents and children accept it. A source can only be replaced by a
    /// source, and the power multiplexer only by a power multiplexer. The
    /// node's phase configuration is cleared.
    pub fn change_component(
        &mut self,
        name: &str,
        component: impl Into<Component>,
        opts: NodeOptions,
    ) -> Result<()> {
        let component = component.into();
        component.validate()?;
        let id = self.find(name)?;
        let node = self.node(id).ok_or_else(|| PowerTreeError::not_found(name))?;
        let old_kind = node.component.kind();
        let new_kind = component.kind();

        let pinned = [ComponentKind::Source, ComponentKind::PMux];
        if (pinned.contains(&old_kind) || pinned.contains(&new_kind)) && old_kind != new_kind {
            return Err(PowerTreeError::topology(format!(
                "'{}' ({}) cannot be replaced by '{}' ({})",
                name,
                old_kind,
                component.name(),
                new_kind
            )));
        }
        for &pid in &node.parents {
            self.check_child(pid, &component)?;
        }
        for &cid in &node.children {
            let child = self.node(cid).ok_or_else(|| PowerTreeError::not_found(cid.to_string()))?;
            if !new_kind.accepts_child(child.component.kind()) {
                return Err(incompatible(&component, &child.component));
            }
        }

        let old_rail = self.meta.rail(id).map(str::to_string);
        self.release_names(id, name);
        if let Err(e) = self.check_names(component.name(), opts.rail.as_deref()) {
            self.claim_names(id, name, old_rail.as_deref());
            return Err(e);
        }
        let opts = self.load_options(&component, opts);
        self.claim_names(id, component.name(), opts.rail.as_deref());
        self.meta.options.insert(id, opts);
        self.meta.phase_conf.remove(&id);
        self.node_mut(id)?.component = component;
        self.rebuild()
    }

    /// Remove a component.
    ///
    /// With `with_children` the whole subtree goes; otherwise the children
    /// are reconnected to the component's parent. A source must be removed
    /// with its children and cannot be the last source. Nodes feeding the
    /// power multiplexer, and the multiplexer itself, can only be removed
    /// with their children.
    pub fn remove_component(&mut self, name: &str, with_children: bool) -> Result<()> {
        let id = self.find(name)?;
        let node = self.node(id).ok_or_else(|| PowerTreeError::not_found(name))?.clone();
        let kind = node.component.kind();

        if kind == ComponentKind::Source {
            if !with_children {
                return Err(PowerTreeError::topology(format!(
                    "source '{}' must be removed with its children",
                    name
                )));
            }
            if self.sources().len() < 2 {
                return Err(PowerTreeError::topology("cannot remove the last source"));
            }
        }

        if !with_children {
            if kind == ComponentKind::PMux {
                return Err(PowerTreeError::topology(format!(
                    "power multiplexer '{}' must be removed with its children",
                    name
                )));
            }
            if node.children.iter().any(|c| Some(*c) == self.meta.pmux) {
                return Err(PowerTreeError::topology(format!(
                    "'{}' feeds a power multiplexer and must be removed with its children",
                    name
                )));
            }
            let pid = *node
                .parents
                .first()
                .ok_or_else(|| PowerTreeError::topology(format!("'{}' has no parent", name)))?;
            let parent = self.node(pid).ok_or_else(|| PowerTreeError::not_found(pid.to_string()))?;
            for &cid in &node.children {
                let child = self.node(cid).ok_or_else(|| PowerTreeError::not_found(cid.to_string()))?;
                if !parent.component.kind().accepts_child(child.component.kind()) {
                    return Err(incompatible(&parent.component, &child.component));
                }
            }
            for &cid in &node.children {
                self.node_mut(cid)?.parents = vec![pid];
            }
            let parent = self.node_mut(pid)?;
            parent.children.retain(|c| *c != id);
            parent.children.extend(node.children.iter().copied());
            self.detach(id);
        } else {
            for victim in self.subtree(id) {
                self.detach(victim);
            }
        }
        self.rebuild()
    }

    /// Define the load phases as `(name, duration_s)` pairs.
    ///
    /// There must be none or at least two. Setting phases keeps component
    /// phase configurations.
    pub fn set_phases<S: Into<String>>(&mut self, phases: impl IntoIterator<Item = (S, f64)>) -> Result<()> {
        let phases: Vec<(String, f64)> = phases.into_iter().map(|(n, t)| (n.into(), t)).collect();
        if phases.len() == 1 {
            return Err(PowerTreeError::InvalidPhases {
                message: "there must be at least two phases".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for (name, duration) in &phases {
            if name == RESERVED_PHASE {
                return Err(PowerTreeError::ReservedPhaseName { name: name.clone() });
            }
            if !seen.insert(name.as_str()) {
                return Err(PowerTreeError::InvalidPhases {
                    message: format!("phase '{}' defined twice", name),
                });
            }
            if !(duration.is_finite() && *duration > 0.0) {
                return Err(PowerTreeError::InvalidPhases {
                    message: format!("phase '{}' duration must be > 0, got {}", name, duration),
                });
            }
        }
        self.meta.phases = phases;
        Ok(())
    }

    /// Configure a component's phases: an active list for sources and
    /// switch-like kinds, phase values for loads.
    pub fn set_component_phases(&mut self, name: &str, config: PhaseConfig) -> Result<()> {
        let id = self.find(name)?;
        let component = &self.node(id).ok_or_else(|| PowerTreeError::not_found(name))?.component;
        let kind = component.kind();
        let unsupported = |message: &str| PowerTreeError::UnsupportedPhaseConfig {
            component: name.to_string(),
            message: message.to_string(),
        };
        match &config {
            PhaseConfig::Always => {
                self.meta.phase_conf.remove(&id);
                return Ok(());
            }
            PhaseConfig::Active(list) => {
                if !kind.supports_active_phases() {
                    return Err(unsupported(&format!("{} takes no active-phase list", kind)));
                }
                if list.iter().any(|p| p == RESERVED_PHASE) {
                    return Err(PowerTreeError::ReservedPhaseName {
                        name: RESERVED_PHASE.to_string(),
                    });
                }
            }
            PhaseConfig::Values(values) => {
                if !kind.supports_phase_values() {
                    return Err(unsupported(&format!("{} takes no phase values", kind)));
                }
                if let Component::Load(load) = component {
                    for v in values.values() {
                        load.validate_phase_value(*v)?;
                    }
                }
                if values.contains_key(RESERVED_PHASE) {
                    return Err(PowerTreeError::ReservedPhaseName {
                        name: RESERVED_PHASE.to_string(),
                    });
                }
            }
        }
        self.meta.phase_conf.insert(id, config);
        Ok(())
    }

    /// Replace the operating limits of a component.
    pub fn set_limits(&mut self, name: &str, limits: Limits) -> Result<()> {
        limits.validate(name)?;
        let id = self.find(name)?;
        self.node_mut(id)?.component.set_limits(limits);
        Ok(())
    }

    /// Node of a component by name.
    pub fn find(&self, name: &str) -> Result<NodeId> {
        self.meta
            .names
            .get(name)
            .copied()
            .ok_or_else(|| PowerTreeError::not_found(name))
    }

    /// Component by name.
    pub fn component(&self, name: &str) -> Result<&Component> {
        let id = self.find(name)?;
        self.node(id)
            .map(|n| &n.component)
            .ok_or_else(|| PowerTreeError::not_found(name))
    }

    /// Mutable component by name, bypassing validation.
    pub(crate) fn component_mut(&mut self, name: &str) -> Result<&mut Component> {
        let id = self.find(name)?;
        Ok(&mut self.node_mut(id)?.component)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Live nodes with their ids, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i), n)))
    }

    /// Topological order (parents before children, ties by insertion).
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Sources in topological order.
    pub fn sources(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| {
                self.node(*id)
                    .map(|n| n.component.kind() == ComponentKind::Source)
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn metadata(&self) -> &NetworkMetadata {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Load phases in declaration order.
    pub fn phases(&self) -> &[(String, f64)] {
        &self.meta.phases
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Arena size; per-node vectors are this long.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| PowerTreeError::not_found(id.to_string()))
    }

    fn resolve(&self, name: &str) -> Result<NodeId> {
        self.meta
            .resolve(name)
            .ok_or_else(|| PowerTreeError::not_found(name))
    }

    fn insert(&mut self, component: Component, parents: Vec<NodeId>, opts: NodeOptions) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.claim_names(id, component.name(), opts.rail.as_deref());
        self.meta.options.insert(id, opts);
        self.nodes.push(Some(Node {
            component,
            parents,
            children: Vec::new(),
        }));
        id
    }

    fn check_names(&self, name: &str, rail: Option<&str>) -> Result<()> {
        if self.meta.is_name_used(name) {
            return Err(PowerTreeError::DuplicateName { name: name.to_string() });
        }
        if let Some(rail) = rail {
            if rail == name || self.meta.is_name_used(rail) {
                return Err(PowerTreeError::DuplicateName { name: rail.to_string() });
            }
        }
        Ok(())
    }

    fn claim_names(&mut self, id: NodeId, name: &str, rail: Option<&str>) {
        self.meta.names.insert(name.to_string(), id);
        if let Some(rail) = rail {
            self.meta.rails.insert(rail.to_string(), id);
        }
    }

    fn release_names(&mut self, id: NodeId, name: &str) {
        self.meta.names.remove(name);
        self.meta.rails.retain(|_, n| *n != id);
    }

    /// Loads terminate the tree and drive no rail.
    fn load_options(&self, component: &Component, mut opts: NodeOptions) -> NodeOptions {
        if component.kind() == ComponentKind::Load {
            if let Some(rail) = opts.rail.take() {
                tracing::warn!(component = component.name(), rail = %rail, "rail ignored on load");
            }
        }
        opts
    }

    fn check_child(&self, pid: NodeId, child: &Component) -> Result<()> {
        let parent = self.node(pid).ok_or_else(|| PowerTreeError::not_found(pid.to_string()))?;
        if parent.component.kind().accepts_child(child.kind()) {
            Ok(())
        } else {
            Err(incompatible(&parent.component, child))
        }
    }

    /// `id` and all its descendants.
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        let mut out = Vec::new();
        while let Some(n) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            out.push(n);
            if let Some(node) = self.node(n) {
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }

    /// Remove a node and every edge touching it.
    fn detach(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for pid in &node.parents {
            if let Some(Some(parent)) = self.nodes.get_mut(pid.0) {
                parent.children.retain(|c| *c != id);
            }
        }
        for cid in &node.children {
            if let Some(Some(child)) = self.nodes.get_mut(cid.0) {
                child.parents.retain(|p| *p != id);
            }
        }
        self.release_names(id, node.component.name());
        self.meta.options.remove(&id);
        self.meta.phase_conf.remove(&id);
        if self.meta.pmux == Some(id) {
            self.meta.pmux = None;
        }
    }

    fn rebuild(&mut self) -> Result<()> {
        self.order = topological_order(&self.nodes)?;
        Ok(())
    }
}

fn options_of(def: &crate::dsl::ComponentDef) -> NodeOptions {
    NodeOptions {
        rail: def.rail.clone(),
        group: def.group.clone(),
    }
}

fn incompatible(parent: &Component, child: &Component) -> PowerTreeError {
    PowerTreeError::IncompatibleChild {
        parent: parent.name().to_string(),
        parent_kind: parent.kind().to_string(),
        child: child.name().to_string(),
        child_kind: child.kind().to_string(),
    }
}
