//! Deterministic decision core
//!
//! All agent decision logic lives here. This module must be pure and deterministic:
//! - Caller-supplied timestep only
//! - Seeded RNG only
//! - Stable iteration order (by agent ID)
//! - No physics, rendering or platform dependencies

pub mod avoidance;
pub mod controller;
pub mod environment;
pub mod geometry;
pub mod navigation;
pub mod planner;
pub mod risk;
pub mod rules;
pub mod state;
pub mod strategy;
pub mod tick;
pub mod watchdog;

#[cfg(test)]
mod fixtures;

pub use avoidance::{AvoidanceContext, Candidate};
pub use controller::{Controller, ControllerState, HelmCommand};
pub use environment::{PerformanceModel, PolarTable, UniformWind, WindField};
pub use navigation::{Navigator, StartCommand, StartPlan};
pub use planner::{PlanOutcome, RoutePlanner};
pub use risk::{RiskAssessor, Role, Severity};
pub use rules::{RightOfWayVerdict, Rule, RuleContext, resolve};
pub use state::{
    Agent, AgentId, BoatStats, Boundary, Course, Island, Mark, MarkKind, RacePhase, RaceState,
    Tack, WaterCurrent, WindSample, World,
};
pub use strategy::{SailingZone, TackPlanner};
pub use tick::{Fleet, RngState, tick};
pub use watchdog::{LivenessState, Override, Watchdog};
