//! Collision risk assessment
//!
//! Classifies the worst closest-point-of-approach against every rival and
//! remembers the cooperative role for that encounter. A committed severity is
//! held for a while so the avoidance layer does not flap between plans.

use serde::{Deserialize, Serialize};

use super::rules::{RuleContext, resolve};
use super::state::{Agent, World};
use crate::settings::RiskTuning;

/// Collision risk level, ordered by urgency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Imminent,
}

/// Cooperative role in the most severe encounter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[default]
    None,
    StandOn,
    GiveWay,
}

/// Closest point of approach between two agents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    /// Separation now
    pub distance: f32,
    /// Separation at the closest point (equals `distance` when diverging)
    pub cpa: f32,
    /// Seconds until the closest point; zero or negative when diverging
    pub tcpa: f32,
}

/// Closed-form CPA/TCPA from relative position and velocity
pub fn closest_approach(own: &Agent, other: &Agent) -> Approach {
    let rel_pos = other.pos - own.pos;
    let rel_vel = other.velocity() - own.velocity();
    let distance = rel_pos.length();

    let v_sq = rel_vel.length_squared();
    if v_sq < 1e-3 {
        // Same velocity: separation never changes
        return Approach {
            distance,
            cpa: distance,
            tcpa: 0.0,
        };
    }

    let tcpa = -rel_pos.dot(rel_vel) / v_sq;
    let cpa = if tcpa > 0.0 {
        (rel_pos + rel_vel * tcpa).length()
    } else {
        distance
    };
    Approach { distance, cpa, tcpa }
}

/// Nested distance and time thresholds, tightest match wins
pub fn classify(approach: &Approach, tuning: &RiskTuning) -> Severity {
    if approach.distance >= tuning.detection_radius {
        return Severity::Low;
    }
    let closing_within = |cpa: f32, tcpa: f32| approach.cpa < cpa && approach.tcpa > 0.0 && approach.tcpa < tcpa;

    if approach.distance < tuning.imminent_distance
        || closing_within(tuning.imminent_cpa, tuning.imminent_tcpa)
    {
        Severity::Imminent
    } else if closing_within(tuning.high_cpa, tuning.high_tcpa) {
        Severity::High
    } else if closing_within(tuning.medium_cpa, tuning.medium_tcpa) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Latched risk state for one agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskAssessor {
    severity: Severity,
    role: Role,
    commit_timer: f32,
}

impl RiskAssessor {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn commit_timer(&self) -> f32 {
        self.commit_timer
    }

    /// Re-assess against every rival and latch the result
    pub fn update(&mut self, agent: &Agent, world: &World, dt: f32, tuning: &RiskTuning) {
        let ctx = RuleContext::from_world(world);
        let mut worst = Severity::Low;
        let mut role = Role::None;

        for other in world.rivals(agent.id) {
            let severity = classify(&closest_approach(agent, other), tuning);
            if severity > worst {
                worst = severity;
                role = match resolve(agent, other, &ctx) {
                    Some(verdict) if verdict.holds_right_of_way(agent.id) => Role::StandOn,
                    Some(_) => Role::GiveWay,
                    None => Role::None,
                };
            }
        }

        self.latch(worst, role, dt, tuning);
    }

    /// Apply one instantaneous reading
    ///
    /// While the commit timer runs a reading below the held severity is
    /// ignored. Give-way encounters at medium or worse, and any high or
    /// imminent reading, restart the timer.
    pub fn latch(&mut self, severity: Severity, role: Role, dt: f32, tuning: &RiskTuning) {
        self.commit_timer = (self.commit_timer - dt).max(0.0);
        if self.commit_timer > 0.0 && severity < self.severity {
            return;
        }

        if severity != self.severity {
            log::trace!("Risk {:?} -> {:?} ({:?})", self.severity, severity, role);
        }
        self.severity = severity;
        self.role = role;

        let refresh = (severity >= Severity::Medium && role == Role::GiveWay) || severity >= Severity::High;
        if severity == Severity::Low {
            self.commit_timer = 0.0;
        } else if refresh || self.commit_timer == 0.0 {
            self.commit_timer = tuning.commit_duration;
        }
    }
}
