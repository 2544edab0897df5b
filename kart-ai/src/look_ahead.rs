use bevy_math::Vec2;

use crate::route::ChosenPath;
use crate::track_graph::{CorridorProjection, NodeId, TrackGraph};

/// Number of nodes cached ahead of every node.
pub const LOOK_AHEAD_NODES: usize = 10;

/// For every node, the next `size` nodes along a [`ChosenPath`].
///
/// Lists are shorter near the end of an open track. Rebuilt whenever the
/// path changes; steering only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct LookAheadCache {
    size: usize,
    all: Vec<Vec<NodeId>>,
}

impl LookAheadCache {
    pub fn new(path: &ChosenPath, size: usize) -> Self {
        let mut cache = Self {
            size,
            all: Vec::new(),
        };
        cache.rebuild(path);
        cache
    }

    pub fn rebuild(&mut self, path: &ChosenPath) {
        self.all = (0..path.len())
            .map(|start| {
                let mut list = Vec::with_capacity(self.size);
                let mut current = start;
                while list.len() < self.size {
                    let Some(next) = path.next(current) else {
                        break;
                    };
                    list.push(next);
                    current = next;
                }
                list
            })
            .collect();
    }

    /// Nodes following `node`, nearest first. `node` itself is not included.
    pub fn get(&self, node: NodeId) -> &[NodeId] {
        &self.all[node]
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// The shared graph seen through one controller's route.
#[derive(Debug, Clone, Copy)]
pub struct TrackView<'a> {
    pub graph: &'a TrackGraph,
    pub path: &'a ChosenPath,
    pub look_ahead: &'a LookAheadCache,
}

impl<'a> TrackView<'a> {
    pub fn new(graph: &'a TrackGraph, path: &'a ChosenPath, look_ahead: &'a LookAheadCache) -> Self {
        Self {
            graph,
            path,
            look_ahead,
        }
    }

    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        self.path.next(node)
    }

    /// `node` followed by its look-ahead.
    pub fn candidates(&self, node: NodeId) -> impl Iterator<Item = NodeId> + 'a {
        std::iter::once(node).chain(self.look_ahead.get(node).iter().copied())
    }

    pub fn project(&self, node: NodeId, point: Vec2) -> CorridorProjection {
        self.graph.project(node, self.path.next(node), point)
    }

    /// Is `point` inside the corridor of `node` or any node after it,
    /// keeping `margin` from the edge?
    pub fn on_road(&self, node: NodeId, point: Vec2, margin: f32) -> bool {
        self.candidates(node)
            .any(|candidate| self.project(candidate, point).contains(margin))
    }

    /// Route distance from `point` to the far end of the last corridor the
    /// look-ahead of `node` covers. A terminal node adds its own radius.
    pub fn covered_distance(&self, node: NodeId, point: Vec2) -> f32 {
        let segment = |from: NodeId| match self.path.next(from) {
            Some(next) => self.graph.distance_to_next(from, next),
            None => self.graph.node(from).width * 0.5,
        };
        let here = self.project(node, point);
        let rest: f32 = self.look_ahead.get(node).iter().map(|&id| segment(id)).sum();
        segment(node) * (1.0 - here.t) + rest
    }

    /// Candidate whose center line passes closest to `point`. Earlier
    /// candidates win ties, so a kart sitting on a joint keeps its node.
    pub fn locate(&self, node: NodeId, point: Vec2) -> (NodeId, CorridorProjection) {
        let mut best = (node, self.project(node, point));
        for candidate in self.look_ahead.get(node).iter().copied() {
            let projection = self.project(candidate, point);
            if projection.lateral.abs() < best.1.lateral.abs() {
                best = (candidate, projection);
            }
        }
        best
    }
}
