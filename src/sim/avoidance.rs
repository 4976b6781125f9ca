//! Reactive avoidance
//!
//! Scores a fixed fan of heading offsets around the desired heading and picks
//! the cheapest. Each candidate is projected forward over a short lookahead;
//! cost comes from deviation, projected separation to rivals, marks, the
//! course boundary and islands. The search always returns a heading, even
//! when every candidate is expensive.

use glam::Vec2;

use super::geometry::{closest_point_on_segment, distance_to_segment, ray_circle_intersection, segment_intersects_polygon};
use super::risk::{Role, Severity};
use super::rules::{RuleContext, resolve};
use super::state::{Agent, Island, World};
use super::watchdog::LivenessState;
use crate::settings::{AvoidanceTuning, LivenessCosts};
use crate::{heading_vector, normalize_angle};

/// Everything the selector reads for one agent
#[derive(Clone, Copy)]
pub struct AvoidanceContext<'a> {
    pub agent: &'a Agent,
    pub world: &'a World<'a>,
    pub liveness: LivenessState,
    pub severity: Severity,
    pub role: Role,
}

/// One scored heading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub offset: f32,
    pub heading: f32,
    pub cost: f32,
}

impl LivenessCosts {
    fn for_state(&self, state: LivenessState) -> f32 {
        match state {
            LivenessState::Normal => self.normal,
            LivenessState::Recovery => self.recovery,
            LivenessState::Force => self.force,
        }
    }
}

impl AvoidanceContext<'_> {
    fn contested(&self) -> bool {
        matches!(self.severity, Severity::Medium | Severity::High)
    }

    /// Required separation from rivals
    fn safe_distance(&self, tuning: &AvoidanceTuning) -> f32 {
        match self.liveness {
            LivenessState::Force => tuning.safe_distance_force,
            LivenessState::Recovery => tuning.safe_distance_recovery,
            LivenessState::Normal if self.role == Role::GiveWay && self.contested() => {
                tuning.give_way_bubble
            }
            LivenessState::Normal if !self.world.is_racing() || self.agent.race.leg == 0 => {
                tuning.safe_distance_start
            }
            LivenessState::Normal => tuning.safe_distance,
        }
    }
}

/// Score every candidate offset around `desired`
pub fn score_candidates(ctx: &AvoidanceContext, desired: f32, tuning: &AvoidanceTuning) -> Vec<Candidate> {
    let agent = ctx.agent;
    let world = ctx.world;
    let rules = RuleContext::from_world(world);
    let normal = ctx.liveness == LivenessState::Normal;
    let safe = ctx.safe_distance(tuning);
    let speed = agent.speed.max(tuning.speed_floor);
    let lookahead = tuning.lookahead;
    let samples = tuning.samples.max(1);

    let rivals: Vec<&Agent> = world.rivals(agent.id).collect();
    let island_extents: Vec<f32> = world.course.islands.iter().map(Island::extent).collect();

    tuning
        .offsets
        .iter()
        .map(|&offset| {
            let heading = normalize_angle(desired + offset);
            let velocity = heading_vector(heading) * speed;
            let future = agent.pos + velocity * lookahead;

            let mut cost = offset.abs().powf(tuning.deviation_exponent) * tuning.deviation_weight;
            if ctx.role == Role::StandOn && ctx.contested() {
                cost += offset.abs() * tuning.stand_on_weight;
            }

            let mut boat_collision = false;
            let mut static_collision = false;
            let mut rule_violation = false;
            let mut proximity = 0.0;

            // Rivals, sampled along both projected tracks
            for other in &rivals {
                let other_velocity = other.velocity();

                if ctx.role == Role::GiveWay && ctx.contested() {
                    let other_future = other.pos + other_velocity * lookahead;
                    let offset_at_end = future - other_future;
                    if offset_at_end.length() < tuning.cross_bow_radius {
                        // Ahead of the rival's bow is a crossing, behind is a duck
                        if offset_at_end.dot(heading_vector(other.heading)) > 0.0 {
                            cost += tuning.cross_bow_penalty;
                        } else {
                            cost -= tuning.duck_stern_bonus;
                        }
                    }
                }

                for i in 1..=samples {
                    let t = i as f32 / samples as f32 * lookahead;
                    let dist_sq = (agent.pos + velocity * t).distance_squared(other.pos + other_velocity * t);

                    if dist_sq < safe * safe {
                        boat_collision = true;
                        cost += tuning.collision_weight / (dist_sq + 10.0);
                        if ctx.severity == Severity::Imminent {
                            cost += tuning.imminent_surcharge;
                        } else if resolve(agent, other, &rules).is_some_and(|v| v.winner == other.id) {
                            rule_violation = true;
                        }
                    } else if normal && dist_sq < tuning.proximity_radius * tuning.proximity_radius {
                        proximity += tuning.proximity_weight / (dist_sq + 10.0);
                    }
                }
            }

            // Marks: distance to the whole track so fast projections cannot tunnel through
            for mark in world.course.marks() {
                let dist_sq = closest_point_on_segment(mark.pos, agent.pos, future).distance_squared(mark.pos);
                if dist_sq < tuning.mark_hard_radius * tuning.mark_hard_radius {
                    static_collision = true;
                    cost += tuning.mark_hard_weight / (dist_sq + 1.0);
                } else if normal && dist_sq < tuning.mark_soft_radius * tuning.mark_soft_radius {
                    proximity += tuning.mark_soft_weight / (dist_sq + 100.0);
                }
            }

            // Boundary ring
            let boundary = world.course.boundary;
            let hard_ring = boundary.radius - tuning.boundary_hard_margin;
            let current_dist = agent.pos.distance(boundary.center);
            let future_dist = future.distance(boundary.center);
            let leaves_ring = if current_dist < hard_ring {
                ray_circle_intersection(agent.pos, future - agent.pos, boundary.center, hard_ring)
                    .is_some_and(|t| t <= 1.0)
            } else {
                future_dist > hard_ring
            };
            if leaves_ring {
                static_collision = true;
            }
            let soft_ring = boundary.radius - tuning.boundary_soft_margin;
            if future_dist > current_dist && future_dist > soft_ring {
                proximity += tuning.boundary_soft_weight * (future_dist - soft_ring) / tuning.boundary_soft_margin;
            }

            // Islands
            for (island, &extent) in world.course.islands.iter().zip(&island_extents) {
                let d = distance_to_segment(island.center, agent.pos, future);
                if d >= extent + tuning.island_check_margin {
                    continue;
                }
                if segment_intersects_polygon(agent.pos, future, &island.vertices) {
                    static_collision = true;
                    cost += tuning.island_hit_cost;
                } else if d < island.radius + tuning.island_soft_margin {
                    proximity += tuning.island_soft_weight * (1.0 - (d - island.radius) / tuning.island_soft_margin);
                }
            }

            if boat_collision {
                cost += tuning.boat_collision.for_state(ctx.liveness);
            }
            if static_collision {
                cost += tuning.static_collision.for_state(ctx.liveness);
            }
            if rule_violation {
                cost += tuning.rule_violation.for_state(ctx.liveness);
            }

            Candidate {
                offset,
                heading,
                cost: cost + proximity,
            }
        })
        .collect()
}

/// Cheapest candidate heading; earlier offsets win exact ties
pub fn select(ctx: &AvoidanceContext, desired: f32, tuning: &AvoidanceTuning) -> f32 {
    let mut best: Option<Candidate> = None;
    for candidate in score_candidates(ctx, desired, tuning) {
        if best.is_none_or(|b| candidate.cost < b.cost) {
            best = Some(candidate);
        }
    }
    best.map_or(normalize_angle(desired), |c| c.heading)
}
