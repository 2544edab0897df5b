use bevy_math::Vec2;
use kart_ai::geometry::{forward, normalize_angle};
use kart_ai::{ControlOutput, KartSpec, KartState};
use serde::{Deserialize, Serialize};

/// Engine and handling numbers shared by every kart in a race.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KartParams {
    pub max_speed: f32,
    /// Acceleration at full throttle, m/s².
    pub engine_accel: f32,
    pub brake_decel: f32,
    /// Speed lost per second per m/s of speed.
    pub drag: f32,
    pub nitro_accel: f32,
    /// Extra top speed while nitro burns.
    pub nitro_speed_bonus: f32,
    /// Energy burnt per second of nitro.
    pub nitro_burn: f32,
    pub max_nitro: f32,
    /// Yaw rate multiplier while skidding.
    pub skid_yaw_factor: f32,
}

impl Default for KartParams {
    fn default() -> Self {
        Self {
            max_speed: 20.0,
            engine_accel: 9.0,
            brake_decel: 20.0,
            drag: 0.05,
            nitro_accel: 6.0,
            nitro_speed_bonus: 5.0,
            nitro_burn: 1.0,
            max_nitro: 5.0,
            skid_yaw_factor: 1.25,
        }
    }
}

/// Kinematic bicycle model of one kart.
#[derive(Debug, Clone)]
pub struct KartBody {
    pub state: KartState,
}

impl KartBody {
    pub fn new(position: Vec2, heading: f32, params: &KartParams) -> Self {
        Self {
            state: KartState::at_rest(position, heading, params.max_speed),
        }
    }

    /// Put the kart back on the track at rest.
    pub fn place(&mut self, position: Vec2, heading: f32) {
        let state = &mut self.state;
        state.position = position;
        state.heading = normalize_angle(heading);
        state.velocity = Vec2::ZERO;
        state.speed = 0.0;
        state.angular_velocity = 0.0;
    }

    pub fn step(&mut self, controls: &ControlOutput, spec: &KartSpec, params: &KartParams, dt: f32) {
        let state = &mut self.state;
        let burning = controls.nitro && state.nitro_energy > 0.0;

        let mut accel = controls.throttle.clamp(0.0, 1.0) * params.engine_accel - params.drag * state.speed;
        if controls.brake {
            accel -= params.brake_decel;
        }
        let mut top = params.max_speed;
        if burning {
            accel += params.nitro_accel;
            top += params.nitro_speed_bonus;
            state.nitro_energy = (state.nitro_energy - params.nitro_burn * dt).max(0.0);
        }
        // Zippers and hits can leave the kart above its top speed; let drag
        // and the clamp bring it back over time.
        let limit = top.max(state.speed);
        state.speed = (state.speed + accel * dt).clamp(0.0, limit);

        let steer = controls.steer_angle.clamp(-spec.max_steer_angle, spec.max_steer_angle);
        let mut yaw_rate = state.speed * steer.tan() / spec.wheel_base;
        if controls.skid {
            yaw_rate *= params.skid_yaw_factor;
        }
        state.angular_velocity = yaw_rate;
        state.heading = normalize_angle(state.heading + yaw_rate * dt);
        state.velocity = forward(state.heading) * state.speed;
        state.position += state.velocity * dt;
    }
}
