//! Regatta AI - decision and planning core for autonomous sailing agents
//!
//! Core modules:
//! - `sim`: Deterministic decision core (rules, planning, avoidance, liveness)
//! - `settings`: Data-driven tuning for every controller threshold
//! - `error`: Course and configuration errors
//!
//! Conventions used throughout the crate: world `x` grows east and `y` grows
//! south (screen space). Headings are radians with `0` pointing north and
//! positive angles turning clockwise. Wind direction is the bearing the wind
//! blows *from*.

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, CourseError};
pub use settings::Tuning;

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep of the demo driver (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Decision recomputation interval (10 Hz)
    pub const DECISION_INTERVAL: f32 = 0.1;

    /// World units travelled per second at one knot
    pub const UNITS_PER_KNOT: f32 = 15.0;

    /// Distance from hull center to stern, used by the clear-astern test
    pub const HULL_STERN_OFFSET: f32 = 30.0;
    /// Distance from hull center to bow
    pub const HULL_BOW_OFFSET: f32 = 25.0;

    /// Default mark zone radius
    pub const ZONE_RADIUS: f32 = 165.0;
    /// Default number of legs (start leg excluded)
    pub const TOTAL_LEGS: u32 = 4;
    /// Marks required by a valid course: start/finish pair and windward gate
    pub const REQUIRED_MARKS: usize = 4;
}

/// Normalize angle to (-π, π]
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Unit vector pointing along a heading
#[inline]
pub fn heading_vector(heading: f32) -> Vec2 {
    Vec2::new(heading.sin(), -heading.cos())
}

/// Bearing of a direction vector (inverse of [`heading_vector`])
#[inline]
pub fn bearing(v: Vec2) -> f32 {
    v.x.atan2(-v.y)
}

/// Bearing from one point to another
#[inline]
pub fn bearing_to(from: Vec2, to: Vec2) -> f32 {
    bearing(to - from)
}

/// Convert knots to world units per second
#[inline]
pub fn knots_to_units(knots: f32) -> f32 {
    knots * consts::UNITS_PER_KNOT
}

/// Convert world units per second to knots
#[inline]
pub fn units_to_knots(units: f32) -> f32 {
    units / consts::UNITS_PER_KNOT
}
