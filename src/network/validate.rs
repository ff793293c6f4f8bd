//! Power-tree validation.

use crate::components::{ComponentKind, PowerComponent, MAX_INPUTS};
use crate::error::{PowerTreeError, Result};

use super::PowerNetwork;

/// Validate a network before analysis.
///
/// Checks:
/// - At least one source, and sources have no parents
/// - Every other node has exactly one parent, the power multiplexer 2 to 4
/// - Loads have no children
/// - Every node is reachable in the topological order
pub fn validate_network(net: &PowerNetwork) -> Result<()> {
    if net.sources().is_empty() {
        return Err(PowerTreeError::topology("network has no source"));
    }

    let mut live = 0;
    for (id, node) in net.nodes() {
        live += 1;
        let kind = node.component.kind();
        let name = node.component.name();
        let (min, max) = match kind {
            ComponentKind::Source => (0, 0),
            ComponentKind::PMux => (2, MAX_INPUTS),
            _ => (1, 1),
        };
        if node.parents.len() < min || node.parents.len() > max {
            return Err(PowerTreeError::topology(format!(
                "'{}' ({}) has {} parents",
                name,
                kind,
                node.parents.len()
            )));
        }
        if kind == ComponentKind::PMux && net.metadata().pmux != Some(id) {
            return Err(PowerTreeError::MultipleMux {
                existing: name.to_string(),
            });
        }
        if kind == ComponentKind::Load && !node.children.is_empty() {
            return Err(PowerTreeError::topology(format!("load '{}' has children", name)));
        }
    }

    if live != net.order().len() {
        return Err(PowerTreeError::topology("power tree contains a cycle"));
    }

    Ok(())
}
