use std::fmt;

use bevy_math::Vec2;
use serde::{Deserialize, Serialize};

/// Stable handle for a competitor in the host's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitorId(pub u32);

impl fmt::Display for CompetitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kart#{}", self.0)
    }
}

/// Items a kart can hold. A bomb is passed on rather than fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    BubbleGum,
    Cake,
    Bowling,
    Zipper,
    Plunger,
    Anvil,
    Bomb,
}

/// Fixed dimensions and limits of the controlled kart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KartSpec {
    pub length: f32,
    pub width: f32,
    pub wheel_base: f32,
    /// Full steering lock, radians.
    pub max_steer_angle: f32,
    /// Seconds to move the wheel from centre to full lock.
    pub time_full_steer: f32,
}

impl Default for KartSpec {
    fn default() -> Self {
        Self {
            length: 1.5,
            width: 1.0,
            wheel_base: 1.18,
            max_steer_angle: 0.6,
            time_full_steer: 0.2,
        }
    }
}

/// The kart's own state as the physics host sees it this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct KartState {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Radians, counter-clockwise from +X.
    pub heading: f32,
    /// Yaw rate, radians per second.
    pub angular_velocity: f32,
    /// Forward speed.
    pub speed: f32,
    pub max_speed: f32,
    pub on_ground: bool,
    pub nitro_energy: f32,
    pub held_item: Option<ItemKind>,
    /// The host is still repositioning the kart after a rescue.
    pub rescuing: bool,
    pub finished: bool,
    /// Distance left until the finish line.
    pub remaining_distance: f32,
}

impl KartState {
    /// A kart at rest, facing `heading`, with nothing held.
    pub fn at_rest(position: Vec2, heading: f32, max_speed: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            heading,
            angular_velocity: 0.0,
            speed: 0.0,
            max_speed,
            on_ground: true,
            nitro_energy: 0.0,
            held_item: None,
            rescuing: false,
            finished: false,
            remaining_distance: f32::INFINITY,
        }
    }

    /// Unit vector the kart moves along; falls back to the heading when
    /// standing still.
    pub fn travel_direction(&self) -> Vec2 {
        self.velocity
            .try_normalize()
            .unwrap_or_else(|| Vec2::from_angle(self.heading))
    }
}

/// One competitor in the immutable per-tick registry snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitorSnapshot {
    pub id: CompetitorId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Completed laps.
    pub lap: u32,
    /// Distance along the current lap.
    pub progress: f32,
    pub human: bool,
    pub team: Option<u32>,
}

impl CompetitorSnapshot {
    pub fn new(id: CompetitorId, position: Vec2, lap: u32, progress: f32) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            lap,
            progress,
            human: false,
            team: None,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn human(mut self) -> Self {
        self.human = true;
        self
    }

    pub fn in_team(mut self, team: u32) -> Self {
        self.team = Some(team);
        self
    }

    /// True if `self` is further along the race than `other`.
    pub fn is_ahead_of(&self, other: &CompetitorSnapshot) -> bool {
        (self.lap, self.progress) > (other.lap, other.progress)
    }

    pub fn same_team(&self, other: &CompetitorSnapshot) -> bool {
        matches!((self.team, other.team), (Some(a), Some(b)) if a == b)
    }
}

/// Everything the controller asks of the kart this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ControlOutput {
    /// Radians, positive turns left, within full lock.
    pub steer_angle: f32,
    /// `0.0..=1.0`.
    pub throttle: f32,
    pub brake: bool,
    pub nitro: bool,
    pub fire: bool,
    pub skid: bool,
    /// Fire the held item backwards.
    pub look_back: bool,
}
