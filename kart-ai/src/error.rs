//! Construction-time errors. Nothing in the per-tick path returns an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::track_graph::NodeId;

/// Errors raised while building or loading a track graph.
#[derive(Debug, Error)]
pub enum TrackError {
    /// The graph has no nodes at all.
    #[error("track graph has no nodes")]
    Empty,

    /// A node on a closed track has nowhere to go.
    #[error("node {node} has no successor on a closed track")]
    NoSuccessor {
        /// Offending node.
        node: NodeId,
    },

    /// A successor points outside the node table.
    #[error("node {node} lists successor {successor}, but the track only has {len} nodes")]
    InvalidSuccessor {
        /// Offending node.
        node: NodeId,
        /// The out of range successor.
        successor: NodeId,
        /// Number of nodes in the graph.
        len: usize,
    },

    /// Width must be finite and positive.
    #[error("node {node} has invalid width {width}")]
    InvalidWidth {
        /// Offending node.
        node: NodeId,
        /// The rejected width.
        width: f32,
    },

    /// Node cannot be reached from node 0 following successors.
    #[error("node {node} is unreachable from the start node")]
    Unreachable {
        /// Offending node.
        node: NodeId,
    },

    /// The track file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The track file is not valid TOML for a track.
    #[error("failed to parse track: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised while validating or loading a difficulty profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// `handicap_accel` must lie in `0.0..=1.0`.
    #[error("handicap acceleration {0} is outside 0.0..=1.0")]
    HandicapOutOfRange(f32),

    /// The start delay range is empty or negative.
    #[error("start delay range {min}..={max} is invalid")]
    StartDelay {
        /// Lower bound in seconds.
        min: f32,
        /// Upper bound in seconds.
        max: f32,
    },

    /// Skidding threshold must be positive.
    #[error("skidding threshold {0} must be positive")]
    SkiddingThreshold(f32),

    /// The crash horizon may not start beyond the cached look-ahead.
    #[error("min_look_ahead_steps {steps} exceeds the look-ahead of {max} nodes")]
    LookAheadSteps {
        /// Requested minimum.
        steps: usize,
        /// Look-ahead size.
        max: usize,
    },

    /// Unknown preset name.
    #[error("unknown difficulty {0:?}, expected easy, medium or hard")]
    UnknownDifficulty(String),

    /// The profile file is not valid TOML for a profile.
    #[error("failed to parse profile: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_successor_names_everything() {
        let err = TrackError::InvalidSuccessor {
            node: 3,
            successor: 9,
            len: 5,
        };
        let msg = format!("{err}");
        assert!(msg.contains('3'));
        assert!(msg.contains('9'));
        assert!(msg.contains('5'));
    }

    #[test]
    fn unknown_difficulty_quotes_input() {
        let err = ProfileError::UnknownDifficulty("brutal".to_string());
        assert!(format!("{err}").contains("\"brutal\""));
    }
}
