//! Navigation target selection
//!
//! Picks where an agent is going: a spot on the start line before the gun,
//! the active gate while racing, open water once finished. With islands on
//! the course the destination goes through the route planner and the agent
//! follows the resulting waypoints.

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::planner::RoutePlanner;
use super::state::{Agent, Course, World};
use super::watchdog::LivenessState;
use crate::settings::{NavigationTuning, PlannerTuning};
use crate::{bearing_to, heading_vector, normalize_angle};

/// Personal start preferences, drawn once per agent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartPlan {
    /// Fraction along the line from the pin (mark 0) to mark 1
    pub line_pct: f32,
    /// How far below the line to hover before the final approach
    pub hover_distance: f32,
}

impl StartPlan {
    pub fn random<R: Rng>(rng: &mut R, tuning: &NavigationTuning) -> Self {
        Self {
            line_pct: sample_between(rng, tuning.start_pct_min, tuning.start_pct_max),
            hover_distance: sample_between(rng, tuning.start_distance_min, tuning.start_distance_max),
        }
    }

    fn line_point(&self, course: &Course, pct: f32) -> Vec2 {
        let (m1, m2) = course.start_line();
        m1 + (m2 - m1) * pct
    }
}

/// Uniform pick between two bounds in either order; an empty range yields the lower bound
fn sample_between<R: Rng>(rng: &mut R, a: f32, b: f32) -> f32 {
    let (lo, hi) = (a.min(b), a.max(b));
    if lo < hi && (hi - lo).is_finite() {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}

/// Normal of the gate line `m1 -> m2`, pointing upwind for standard courses
fn gate_normal(m1: Vec2, m2: Vec2) -> Vec2 {
    let d = m2 - m1;
    Vec2::new(d.y, -d.x)
}

/// Destination before route planning
pub fn destination(
    agent: &Agent,
    world: &World,
    liveness: LivenessState,
    start: &StartPlan,
    tuning: &NavigationTuning,
) -> Vec2 {
    let course = world.course;

    if agent.race.finished {
        let boundary = course.boundary;
        let out = (agent.pos - boundary.center).normalize_or(Vec2::NEG_Y);
        return boundary.center + out * (boundary.radius + tuning.finished_excursion);
    }

    let leg = agent.race.leg;
    let (m1, m2) = course.gate_for_leg(leg);
    let center = (m1 + m2) * 0.5;
    let normal = gate_normal(m1, m2);
    let side = (agent.pos - m1).dot(normal);

    let mut dest = if leg == 0 {
        let wd = world.wind.direction;
        let upwind = heading_vector(wd);
        if agent.race.ocs || side > 0.0 {
            // Must get back below the line first
            let back = if liveness == LivenessState::Normal {
                tuning.ocs_retreat
            } else {
                tuning.ocs_retreat_escalated
            };
            center - upwind * back
        } else {
            let pct = if liveness == LivenessState::Normal { start.line_pct } else { 0.5 };
            let past = if liveness == LivenessState::Force {
                tuning.line_excursion_force
            } else {
                tuning.line_excursion
            };
            start.line_point(course, pct) + upwind * past
        }
    } else {
        // Overshot the gate line without crossing between the marks
        let tolerance = tuning.missed_gate_tolerance * normal.length();
        let (past, toward) = if Course::is_upwind_leg(leg) {
            (side > tolerance, -1.0)
        } else {
            (side < -tolerance, 1.0)
        };
        if past {
            center + normal.normalize_or_zero() * tuning.missed_gate_snap * toward
        } else {
            center
        }
    };

    if agent.race.is_rounding {
        let mark = if agent.pos.distance_squared(m1) < agent.pos.distance_squared(m2) { m1 } else { m2 };
        let outward = mark - center;
        if outward.length_squared() > 0.0 {
            dest = mark + outward.normalize() * tuning.rounding_offset;
        }
    }
    dest
}

/// Cached waypoint chain toward the last planned destination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutePlan {
    pub waypoints: VecDeque<Vec2>,
    pub final_target: Option<Vec2>,
    pub replan_timer: f32,
}

/// Destination plus route following for one agent
#[derive(Debug, Clone)]
pub struct Navigator {
    planner: RoutePlanner,
    plan: RoutePlan,
}

impl Navigator {
    pub fn new(tuning: &PlannerTuning) -> Self {
        Self {
            planner: RoutePlanner::new(tuning),
            plan: RoutePlan::default(),
        }
    }

    pub fn plan(&self) -> &RoutePlan {
        &self.plan
    }

    /// Next point to steer for
    ///
    /// Replans when the timer expires or the destination has moved, then pops
    /// every waypoint the agent has already reached.
    #[allow(clippy::too_many_arguments)]
    pub fn target<R: Rng>(
        &mut self,
        agent: &Agent,
        world: &World,
        liveness: LivenessState,
        start: &StartPlan,
        dt: f32,
        rng: &mut R,
        tuning: &NavigationTuning,
        planner_tuning: &PlannerTuning,
    ) -> Vec2 {
        let dest = destination(agent, world, liveness, start, tuning);
        let islands = &world.course.islands;
        if islands.is_empty() {
            return dest;
        }

        let plan = &mut self.plan;
        plan.replan_timer = (plan.replan_timer - dt).max(0.0);
        let moved = plan
            .final_target
            .is_none_or(|last| last.distance(dest) > planner_tuning.target_moved);

        if plan.replan_timer <= 0.0 || moved {
            plan.final_target = Some(dest);
            plan.waypoints = self.planner.plan_path(agent.pos, dest, islands).into();
            plan.replan_timer = planner_tuning.replan_interval + rng.random_range(0.0..planner_tuning.replan_jitter.max(f32::EPSILON));
        }

        while plan
            .waypoints
            .front()
            .is_some_and(|wp| wp.distance(agent.pos) < planner_tuning.arrival_radius)
        {
            plan.waypoints.pop_front();
        }
        plan.waypoints.front().copied().unwrap_or(dest)
    }
}

/// What to do during the countdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartCommand {
    /// Steer this heading directly
    Steer { heading: f32, speed: f32 },
    /// Sail (tacking if needed) toward a point
    Target { point: Vec2, speed: f32 },
}

/// Prestart maneuver: hover below the line, then time the run to the gun
pub fn start_command(agent: &Agent, world: &World, start: &StartPlan, tuning: &NavigationTuning) -> StartCommand {
    let countdown = world.race_timer;
    let wd = world.wind.direction;
    let upwind = heading_vector(wd);
    let line_point = start.line_point(world.course, start.line_pct);
    let setup = line_point - upwind * start.hover_distance;
    let close_hauled = normalize_angle(wd + std::f32::consts::FRAC_PI_4);

    let to_line = line_point.distance(agent.pos);
    let time_to_run = to_line / tuning.hover_approach_speed;

    if agent.race.ocs {
        let recover = line_point - upwind * tuning.ocs_recover_distance;
        return StartCommand::Steer {
            heading: bearing_to(agent.pos, recover),
            speed: 1.0,
        };
    }

    if countdown <= time_to_run + tuning.hover_buffer || countdown <= tuning.hover_min_countdown {
        // Final approach: go now, or bleed speed if we would arrive early
        let time_to_line = to_line / tuning.final_approach_speed;
        let speed = if time_to_line < countdown - tuning.early_margin {
            tuning.kill_speed
        } else {
            1.0
        };
        return StartCommand::Target {
            point: line_point,
            speed,
        };
    }

    if agent.pos.distance(setup) <= tuning.setup_tolerance {
        return StartCommand::Steer {
            heading: close_hauled,
            speed: tuning.hover_speed,
        };
    }

    // Too close to the line: park close-hauled at low speed
    let below_line = (line_point - agent.pos).dot(upwind);
    if below_line < start.hover_distance - tuning.hover_buffer {
        StartCommand::Steer {
            heading: close_hauled,
            speed: tuning.hover_speed,
        }
    } else {
        StartCommand::Steer {
            heading: bearing_to(agent.pos, setup),
            speed: 1.0,
        }
    }
}
