use std::f32::consts::{PI, TAU};

use bevy_math::Vec2;

/// Wrap an angle into `(-PI, PI]`.
///
/// Steering compares headings by subtraction, so an unwrapped difference
/// near +-PI would flip sign from one tick to the next.
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() || (angle > -PI && angle <= PI) {
        return angle;
    }
    let mut wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped -= TAU;
    }
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped <= -PI {
        wrapped += TAU;
    }
    wrapped
}

/// Heading of a direction vector, counter-clockwise from +X.
pub fn heading_of(direction: Vec2) -> f32 {
    direction.y.atan2(direction.x)
}

/// Unit vector for a heading.
pub fn forward(heading: f32) -> Vec2 {
    Vec2::from_angle(heading)
}

/// Closest point on segment `a..b` to `p`, with the segment parameter in `0..=1`.
pub fn project_on_segment(p: Vec2, a: Vec2, b: Vec2) -> (Vec2, f32) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}
