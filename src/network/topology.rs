//! Topological ordering of the power tree.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::graph::Node;
use super::types::NodeId;
use crate::error::{PowerTreeError, Result};

/// Kahn's algorithm over the node arena.
///
/// Among nodes that are ready at the same time the lowest id goes first, so
/// the order only depends on insertion order. Holes left by removed nodes
/// are skipped.
pub fn topological_order(nodes: &[Option<Node>]) -> Result<Vec<NodeId>> {
    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|n| n.as_ref().map(|n| n.parents.len()).unwrap_or(0))
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = nodes
        .iter()
        .enumerate()
        .filter(|(i, n)| n.is_some() && in_degree[*i] == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let live = nodes.iter().filter(|n| n.is_some()).count();
    let mut order = Vec::with_capacity(live);

    while let Some(Reverse(i)) = ready.pop() {
        order.push(NodeId(i));
        if let Some(node) = &nodes[i] {
            for child in &node.children {
                let d = &mut in_degree[child.0];
                *d = d.saturating_sub(1);
                if *d == 0 {
                    ready.push(Reverse(child.0));
                }
            }
        }
    }

    if order.len() != live {
        return Err(PowerTreeError::topology("power tree contains a cycle"));
    }
    Ok(order)
}
