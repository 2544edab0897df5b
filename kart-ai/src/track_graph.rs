use std::collections::VecDeque;

use bevy_math::Vec2;
use tracing::debug;

use crate::error::TrackError;
use crate::geometry::{heading_of, project_on_segment};

pub type NodeId = usize;

/// One slice of drivable surface: a center point, the corridor width there
/// and the nodes a kart may continue to.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub center: Vec2,
    pub width: f32,
    pub successors: Vec<NodeId>,
}

impl Node {
    pub fn new(center: Vec2, width: f32, successors: Vec<NodeId>) -> Self {
        Self {
            center,
            width,
            successors,
        }
    }
}

/// Where a point sits relative to the corridor leaving a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorridorProjection {
    /// Closest point on the center line segment.
    pub closest: Vec2,
    /// Segment parameter of `closest`, `0.0` at the node, `1.0` at the successor.
    pub t: f32,
    /// Signed distance from the center line, positive to the left.
    pub lateral: f32,
    /// Half the corridor width at `closest`.
    pub half_width: f32,
}

impl CorridorProjection {
    pub fn contains(&self, margin: f32) -> bool {
        self.lateral.abs() + margin <= self.half_width
    }
}

/// Immutable directed graph of track nodes.
///
/// Shared read-only between every controller on the track; routing choices
/// live in each controller's [`ChosenPath`](crate::route::ChosenPath).
#[derive(Debug, Clone)]
pub struct TrackGraph {
    nodes: Vec<Node>,
    progress: Vec<f32>,
    length: f32,
    closed: bool,
}

impl TrackGraph {
    /// Validate and build a graph. Node 0 is the start line.
    ///
    /// On a closed track every node needs a successor; on an open track nodes
    /// without successors are terminal.
    pub fn new(nodes: Vec<Node>, closed: bool) -> Result<Self, TrackError> {
        if nodes.is_empty() {
            return Err(TrackError::Empty);
        }
        let len = nodes.len();
        for (id, node) in nodes.iter().enumerate() {
            if !node.width.is_finite() || node.width <= 0.0 {
                return Err(TrackError::InvalidWidth {
                    node: id,
                    width: node.width,
                });
            }
            if node.successors.is_empty() && closed {
                return Err(TrackError::NoSuccessor { node: id });
            }
            if let Some(&successor) = node.successors.iter().find(|&&s| s >= len) {
                return Err(TrackError::InvalidSuccessor {
                    node: id,
                    successor,
                    len,
                });
            }
        }

        let progress = compute_progress(&nodes)?;
        let length = if closed {
            nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| node.successors.contains(&0))
                .map(|(id, node)| progress[id] + node.center.distance(nodes[0].center))
                .fold(0.0f32, f32::max)
        } else {
            progress.iter().copied().fold(0.0f32, f32::max)
        };

        debug!(nodes = len, length, closed, "built track graph");
        Ok(Self {
            nodes,
            progress,
            length,
            closed,
        })
    }

    /// Chain of nodes with a shared width; each node leads to the next one.
    pub fn from_centers(centers: &[Vec2], width: f32, closed: bool) -> Result<Self, TrackError> {
        let n = centers.len();
        let nodes = centers
            .iter()
            .enumerate()
            .map(|(i, &center)| {
                let successors = if i + 1 < n {
                    vec![i + 1]
                } else if closed {
                    vec![0]
                } else {
                    Vec::new()
                };
                Node::new(center, width, successors)
            })
            .collect();
        Self::new(nodes, closed)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Lap length along the first-reached route.
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].successors
    }

    pub fn corner_width(&self, id: NodeId) -> f32 {
        self.nodes[id].width
    }

    /// Distance from the start line to this node, monotonic along any route.
    pub fn progress_distance(&self, id: NodeId) -> f32 {
        self.progress[id]
    }

    /// Node whose center is closest to `position`.
    pub fn nearest_node(&self, position: Vec2) -> NodeId {
        self.nodes
            .iter()
            .enumerate()
            .map(|(id, node)| (id, node.center.distance_squared(position)))
            .fold((0, f32::INFINITY), |best, candidate| {
                if candidate.1 < best.1 { candidate } else { best }
            })
            .0
    }

    pub fn distance_to_next(&self, node: NodeId, next: NodeId) -> f32 {
        self.nodes[node].center.distance(self.nodes[next].center)
    }

    /// Unit direction of the center line from `node` towards `next`.
    pub fn direction_to_next(&self, node: NodeId, next: NodeId) -> Vec2 {
        (self.nodes[next].center - self.nodes[node].center).normalize_or_zero()
    }

    /// Heading of the center line from `node` towards `next`.
    pub fn angle_to_next(&self, node: NodeId, next: NodeId) -> f32 {
        heading_of(self.direction_to_next(node, next))
    }

    /// Project `point` onto the corridor running from `node` to `next`.
    ///
    /// Width is interpolated along the segment. A terminal node (`next` is
    /// `None`) is treated as a disc of its own width.
    pub fn project(&self, node: NodeId, next: Option<NodeId>, point: Vec2) -> CorridorProjection {
        let from = &self.nodes[node];
        let Some(next) = next else {
            return CorridorProjection {
                closest: from.center,
                t: 0.0,
                lateral: from.center.distance(point),
                half_width: from.width * 0.5,
            };
        };
        let to = &self.nodes[next];
        let (closest, t) = project_on_segment(point, from.center, to.center);
        let offset = point - closest;
        let direction = to.center - from.center;
        let sign = if direction.perp_dot(offset) < 0.0 { -1.0 } else { 1.0 };
        CorridorProjection {
            closest,
            t,
            lateral: sign * offset.length(),
            half_width: 0.5 * (from.width + (to.width - from.width) * t),
        }
    }

    pub fn contains(&self, node: NodeId, next: Option<NodeId>, point: Vec2, margin: f32) -> bool {
        self.project(node, next, point).contains(margin)
    }
}

// Breadth first from the start node; the first route to reach a node sets
// its progress.
fn compute_progress(nodes: &[Node]) -> Result<Vec<f32>, TrackError> {
    let mut progress = vec![f32::NAN; nodes.len()];
    progress[0] = 0.0;
    let mut queue = VecDeque::from([0]);
    while let Some(id) = queue.pop_front() {
        for &next in &nodes[id].successors {
            if next != 0 && progress[next].is_nan() {
                progress[next] = progress[id] + nodes[id].center.distance(nodes[next].center);
                queue.push_back(next);
            }
        }
    }
    if let Some(node) = progress.iter().position(|p| p.is_nan()) {
        return Err(TrackError::Unreachable { node });
    }
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f32) -> TrackGraph {
        let centers = [
            Vec2::new(0.0, 0.0),
            Vec2::new(side, 0.0),
            Vec2::new(side, side),
            Vec2::new(0.0, side),
        ];
        TrackGraph::from_centers(&centers, 4.0, true).unwrap()
    }

    #[test]
    fn closed_chain_measures_full_lap() {
        let graph = square(10.0);
        assert_eq!(graph.len(), 4);
        assert!((graph.length() - 40.0).abs() < 1e-4);
        assert_eq!(graph.progress_distance(0), 0.0);
        assert!((graph.progress_distance(2) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn open_chain_ends_in_terminal() {
        let centers: Vec<Vec2> = (0..5).map(|i| Vec2::new(i as f32 * 5.0, 0.0)).collect();
        let graph = TrackGraph::from_centers(&centers, 6.0, false).unwrap();
        assert!(graph.successors(4).is_empty());
        assert!((graph.length() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn rejects_bad_graphs() {
        assert!(matches!(TrackGraph::new(Vec::new(), true), Err(TrackError::Empty)));

        let dead_end = vec![
            Node::new(Vec2::ZERO, 4.0, vec![1]),
            Node::new(Vec2::X, 4.0, Vec::new()),
        ];
        assert!(matches!(
            TrackGraph::new(dead_end, true),
            Err(TrackError::NoSuccessor { node: 1 })
        ));

        let out_of_range = vec![Node::new(Vec2::ZERO, 4.0, vec![7])];
        assert!(matches!(
            TrackGraph::new(out_of_range, true),
            Err(TrackError::InvalidSuccessor { successor: 7, .. })
        ));

        let zero_width = vec![Node::new(Vec2::ZERO, 0.0, vec![0])];
        assert!(matches!(
            TrackGraph::new(zero_width, true),
            Err(TrackError::InvalidWidth { node: 0, .. })
        ));

        let orphan = vec![
            Node::new(Vec2::ZERO, 4.0, vec![0]),
            Node::new(Vec2::X, 4.0, vec![0]),
        ];
        assert!(matches!(
            TrackGraph::new(orphan, true),
            Err(TrackError::Unreachable { node: 1 })
        ));
    }

    #[test]
    fn nearest_node_picks_closest_center() {
        let graph = square(10.0);
        assert_eq!(graph.nearest_node(Vec2::new(9.0, 1.0)), 1);
        assert_eq!(graph.nearest_node(Vec2::new(-2.0, 11.0)), 3);
    }

    #[test]
    fn projection_is_signed_left_positive() {
        let graph = square(10.0);
        let left = graph.project(0, Some(1), Vec2::new(5.0, 1.5));
        assert!((left.lateral - 1.5).abs() < 1e-5);
        assert!(left.contains(0.0));
        let right = graph.project(0, Some(1), Vec2::new(5.0, -2.5));
        assert!((right.lateral + 2.5).abs() < 1e-5);
        assert!(!right.contains(0.0));
    }

    #[test]
    fn width_is_interpolated_along_segment() {
        let nodes = vec![
            Node::new(Vec2::ZERO, 10.0, vec![1]),
            Node::new(Vec2::new(10.0, 0.0), 2.0, Vec::new()),
        ];
        let graph = TrackGraph::new(nodes, false).unwrap();
        let mid = graph.project(0, Some(1), Vec2::new(5.0, 0.0));
        assert!((mid.half_width - 3.0).abs() < 1e-5);
        assert!(graph.contains(0, Some(1), Vec2::new(2.0, 3.5), 0.0));
        assert!(!graph.contains(0, Some(1), Vec2::new(8.0, 3.5), 0.0));
    }

    #[test]
    fn angles_follow_segments() {
        let graph = square(10.0);
        assert!(graph.angle_to_next(0, 1).abs() < 1e-6);
        assert!((graph.angle_to_next(1, 2) - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}
