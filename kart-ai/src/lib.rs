//! Autonomous driver for a single kart.
//!
//! Each tick the host hands a [`KartController`] the kart's own kinematic
//! state and an immutable snapshot of every competitor; the controller
//! answers with a [`ControlOutput`]. The track graph and difficulty profile
//! are built once and shared read-only between controllers.

pub mod controller;
pub mod crash;
pub mod difficulty;
pub mod error;
pub mod geometry;
pub mod items;
pub mod kart;
pub mod look_ahead;
pub mod nearest;
pub mod route;
pub mod steering;
pub mod track_format;
pub mod track_graph;

pub use controller::{ControlState, KartController, RescueHandler};
pub use crash::{CrashPredictor, CrashVerdict};
pub use difficulty::{Difficulty, DifficultyProfile, FallbackTactic, ItemTactic, NitroLevel};
pub use error::{ProfileError, TrackError};
pub use items::{ItemDecision, ItemPolicy};
pub use kart::{CompetitorId, CompetitorSnapshot, ControlOutput, ItemKind, KartSpec, KartState};
pub use look_ahead::LookAheadCache;
pub use nearest::{NearestCompetitorTracker, NearestCompetitors};
pub use route::ChosenPath;
pub use steering::{CurveInfo, PathPlanner, SteeringTarget, TargetKind};
pub use track_format::TrackFile;
pub use track_graph::{Node, NodeId, TrackGraph};
