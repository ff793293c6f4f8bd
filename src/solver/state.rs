//! Per-node solver vectors.

use crate::components::{Inputs, NodeState, PhaseCtx, PowerComponent};
use crate::network::{NodeId, PowerNetwork};

/// Voltage, current and state of every node.
///
/// Vectors are indexed by [`NodeId`] and sized to the network arena; slots
/// of removed nodes stay at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverState {
    /// Output voltage of each node (V)
    pub v: Vec<f64>,
    /// Input current of each node (A)
    pub i: Vec<f64>,
    /// Off flag and selected input of each node
    pub states: Vec<NodeState>,
}

impl SolverState {
    /// Zeroed state for `n` nodes.
    pub fn new(n: usize) -> Self {
        Self {
            v: vec![0.0; n],
            i: vec![0.0; n],
            states: vec![NodeState::default(); n],
        }
    }

    /// First guesses from each component.
    pub fn initial(net: &PowerNetwork, phase: Option<&str>) -> Self {
        let mut state = Self::new(net.capacity());
        for (id, node) in net.nodes() {
            let ctx = PhaseCtx::new(phase, net.metadata().phase_config(id));
            state.v[id.0] = node.component.initial_output_voltage(&ctx);
            state.i[id.0] = node.component.initial_input_current(&ctx);
            state.states[id.0] = node.component.initial_state(&ctx);
        }
        state
    }

    /// Parent voltages and off-states of a node, in priority order.
    pub fn inputs(&self, net: &PowerNetwork, id: NodeId) -> Inputs {
        let mut inputs = Inputs::empty();
        if let Some(node) = net.node(id) {
            for p in &node.parents {
                inputs.push(self.v[p.0], self.states[p.0].off);
            }
        }
        inputs
    }

    /// The parent a node currently draws from.
    pub fn selected_parent(&self, net: &PowerNetwork, id: NodeId) -> Option<NodeId> {
        let node = net.node(id)?;
        let k = self.states[id.0].input?;
        node.parents.get(k).copied()
    }

    /// Current drawn by the children whose selected parent is `id`.
    pub fn attributed_current(&self, net: &PowerNetwork, id: NodeId) -> f64 {
        let Some(node) = net.node(id) else {
            return 0.0;
        };
        node.children
            .iter()
            .filter(|c| self.selected_parent(net, **c) == Some(id))
            .map(|c| self.i[c.0])
            .sum()
    }
}

/// Converged operating point of one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Phase name, `None` without phases
    pub phase: Option<String>,
    /// Iterations used
    pub iterations: usize,
    pub state: SolverState,
}

impl Solution {
    pub fn voltage(&self, id: NodeId) -> f64 {
        self.state.v[id.0]
    }

    pub fn current(&self, id: NodeId) -> f64 {
        self.state.i[id.0]
    }

    pub fn node_state(&self, id: NodeId) -> NodeState {
        self.state.states[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Load, PMux, Source};
    use crate::network::NodeOptions;

    #[test]
    fn test_mux_attribution() {
        let mut net = PowerNetwork::new("t", Source::new("A", 12.0), NodeOptions::new()).unwrap();
        net.add_source(Source::new("B", 5.0), NodeOptions::new()).unwrap();
        let mux = net
            .add_mux(&["A", "B"], PMux::new("MUX"), NodeOptions::new())
            .unwrap();
        let load = net.add_component("MUX", Load::current("L", 1.0), NodeOptions::new()).unwrap();

        let mut state = SolverState::new(net.capacity());
        state.i[mux.0] = 1.0;
        state.i[load.0] = 1.0;
        state.states[mux.0] = NodeState::selected(Some(1), false);

        let a = net.find("A").unwrap();
        let b = net.find("B").unwrap();
        assert_eq!(state.attributed_current(&net, a), 0.0);
        assert_eq!(state.attributed_current(&net, b), 1.0);
        assert_eq!(state.attributed_current(&net, mux), 1.0);

        state.states[mux.0] = NodeState::selected(None, true);
        assert_eq!(state.attributed_current(&net, b), 0.0);
    }
}
