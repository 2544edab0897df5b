//! Headless race host for the kart drivers: kinematics, lap keeping, items
//! and rescues around a set of [`kart_ai::KartController`]s.

pub mod config;
pub mod physics;
pub mod race;

pub use config::{KartEntry, RaceConfig};
pub use physics::{KartBody, KartParams};
pub use race::{Race, RaceSummary, RacerSummary};
