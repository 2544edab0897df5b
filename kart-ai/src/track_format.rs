use bevy_math::Vec2;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::TrackError;
use crate::track_graph::{Node, NodeId, TrackGraph};

const BUILTIN_TRACK: &str = include_str!("../assets/oval.toml");

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TrackFile {
    #[serde(default)]
    pub metadata: TrackMetadata,
    pub nodes: Vec<NodeEntry>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TrackMetadata {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub author: String,
    /// Width used by nodes that don't set their own.
    #[serde(default = "default_track_width")]
    pub track_width: f32,
    #[serde(default = "default_closed")]
    pub closed: bool,
}

/// A node as written in the file. Missing successors mean "the next entry",
/// wrapping to the start on closed tracks.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeEntry {
    pub center: [f32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successors: Option<Vec<NodeId>>,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self {
            name: default_name(),
            author: String::new(),
            track_width: default_track_width(),
            closed: default_closed(),
        }
    }
}

fn default_name() -> String {
    "Untitled".to_string()
}

fn default_track_width() -> f32 {
    12.0
}

fn default_closed() -> bool {
    true
}

impl TrackFile {
    /// Load a track from a TOML file.
    pub fn load(path: &Path) -> Result<Self, TrackError> {
        let text = std::fs::read_to_string(path).map_err(|source| TrackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, TrackError> {
        Ok(toml::from_str(text)?)
    }

    /// The oval shipped with the crate; it has one branch on the back straight.
    pub fn load_builtin() -> Result<Self, TrackError> {
        Self::parse(BUILTIN_TRACK)
    }

    /// Resolve defaults and validate into a graph.
    pub fn to_graph(&self) -> Result<TrackGraph, TrackError> {
        let n = self.nodes.len();
        let closed = self.metadata.closed;
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let successors = match &entry.successors {
                    Some(successors) => successors.clone(),
                    None if i + 1 < n => vec![i + 1],
                    None if closed => vec![0],
                    None => Vec::new(),
                };
                Node::new(
                    Vec2::from(entry.center),
                    entry.width.unwrap_or(self.metadata.track_width),
                    successors,
                )
            })
            .collect();
        TrackGraph::new(nodes, closed)
    }
}
