use rand::Rng;
use tracing::debug;

use crate::track_graph::{NodeId, TrackGraph};

/// Per-controller overlay over the shared graph: which successor this kart
/// takes at every node.
///
/// Indexed by node id. On a closed track without branches
/// `next(i) == (i + 1) % len`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChosenPath {
    successor_index: Vec<usize>,
    next_node: Vec<Option<NodeId>>,
}

impl ChosenPath {
    /// Every node takes its first successor.
    pub fn first_successors(graph: &TrackGraph) -> Self {
        Self::build(graph, |_| 0)
    }

    /// Branching nodes pick a successor uniformly at random.
    pub fn random(graph: &TrackGraph, rng: &mut impl Rng) -> Self {
        Self::build(graph, |count| rng.random_range(0..count))
    }

    fn build(graph: &TrackGraph, mut pick: impl FnMut(usize) -> usize) -> Self {
        let successor_index: Vec<usize> = graph
            .nodes()
            .iter()
            .map(|node| match node.successors.len() {
                0 | 1 => 0,
                count => pick(count),
            })
            .collect();
        let next_node = successor_index
            .iter()
            .enumerate()
            .map(|(id, &index)| graph.successors(id).get(index).copied())
            .collect();
        Self {
            successor_index,
            next_node,
        }
    }

    /// Chosen successor of `node`; `None` only at a terminal node.
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        self.next_node[node]
    }

    /// Which entry of the node's successor list was chosen.
    pub fn successor_index(&self, node: NodeId) -> usize {
        self.successor_index[node]
    }

    /// Commit to another successor at `node`. Returns whether anything changed.
    ///
    /// Out of range indices are ignored.
    pub fn choose(&mut self, graph: &TrackGraph, node: NodeId, index: usize) -> bool {
        let Some(&next) = graph.successors(node).get(index) else {
            return false;
        };
        if self.successor_index[node] == index {
            return false;
        }
        debug!(node, index, next, "switching branch");
        self.successor_index[node] = index;
        self.next_node[node] = Some(next);
        true
    }

    pub fn len(&self) -> usize {
        self.next_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_node.is_empty()
    }
}
