//! Agent, course and world snapshot types
//!
//! Everything the decision core reads lives here. The core never mutates an
//! `Agent` or the `Course`; it only proposes headings for the physics pass.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::environment::{PerformanceModel, WindField};
use super::geometry::{circle_polygon, polygon_centroid};
use crate::consts::*;
use crate::error::CourseError;
use crate::{heading_vector, normalize_angle, units_to_knots};

/// Stable agent identifier, also the final tie-break key
pub type AgentId = u32;

/// Tack side, derived from the boom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tack {
    Port,
    Starboard,
}

impl Tack {
    /// Boom on the positive side is starboard tack
    pub fn from_boom_side(boom_side: f32) -> Self {
        if boom_side > 0.0 { Tack::Starboard } else { Tack::Port }
    }

    /// Tack implied by sailing `heading` in wind blowing from `wind_direction`
    pub fn from_heading(heading: f32, wind_direction: f32) -> Self {
        if normalize_angle(heading - wind_direction) > 0.0 {
            Tack::Starboard
        } else {
            Tack::Port
        }
    }

    /// +1 for starboard, -1 for port
    pub fn sign(self) -> f32 {
        match self {
            Tack::Starboard => 1.0,
            Tack::Port => -1.0,
        }
    }
}

/// Per-boat performance modifiers (0 = stock boat)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoatStats {
    pub acceleration: f32,
    pub momentum: f32,
    pub handling: f32,
    pub upwind: f32,
    pub reach: f32,
    pub downwind: f32,
    /// Sensitivity to wind pressure deviations
    pub boost: f32,
}

/// Per-race progress flags, maintained by the race referee
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceState {
    /// 0 = start leg, odd legs are upwind
    pub leg: u32,
    pub is_rounding: bool,
    pub is_tacking: bool,
    pub in_zone: bool,
    /// On course side at the start
    pub ocs: bool,
    pub penalty: bool,
    pub penalty_timer: f32,
    pub finished: bool,
}

/// One competing boat, as seen by every controller this tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub pos: Vec2,
    /// Radians, normalized to (-π, π]
    pub heading: f32,
    /// World units per second
    pub speed: f32,
    /// +1 or -1
    pub boom_side: f32,
    pub spinnaker: bool,
    pub stats: BoatStats,
    pub race: RaceState,
    /// Contact normal (boat toward mark) reported by physics this tick
    #[serde(default)]
    pub mark_contact: Option<Vec2>,
}

impl Agent {
    pub fn new(id: AgentId, pos: Vec2, heading: f32) -> Self {
        Self {
            id,
            pos,
            heading: normalize_angle(heading),
            speed: 0.0,
            boom_side: 1.0,
            spinnaker: false,
            stats: BoatStats::default(),
            race: RaceState::default(),
            mark_contact: None,
        }
    }

    /// Velocity in world units per second
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        heading_vector(self.heading) * self.speed
    }

    #[inline]
    pub fn speed_knots(&self) -> f32 {
        units_to_knots(self.speed)
    }

    #[inline]
    pub fn tack(&self) -> Tack {
        Tack::from_boom_side(self.boom_side)
    }
}

/// Mark role on the course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkKind {
    Start,
    Gate,
}

/// A buoy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub pos: Vec2,
    pub kind: MarkKind,
}

impl Mark {
    pub fn new(pos: Vec2, kind: MarkKind) -> Self {
        Self { pos, kind }
    }
}

/// Circular race area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub center: Vec2,
    pub radius: f32,
}

/// A static obstacle: a star-shaped vertex ring around its centroid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Island {
    pub center: Vec2,
    /// Nominal radius (vertices may lie somewhat inside or outside it)
    pub radius: f32,
    pub vertices: Vec<Vec2>,
}

impl Island {
    pub fn new(radius: f32, vertices: Vec<Vec2>) -> Self {
        Self {
            center: polygon_centroid(&vertices),
            radius,
            vertices,
        }
    }

    /// Distance from the center to the furthest vertex
    pub fn extent(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v.distance(self.center))
            .fold(self.radius, f32::max)
    }

    /// Regular polygon island
    pub fn circle(center: Vec2, radius: f32, points: usize) -> Self {
        Self {
            center,
            radius,
            vertices: circle_polygon(center, radius, points),
        }
    }
}

/// Immutable race geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// 0-1 start/finish line, 2-3 windward gate
    marks: [Mark; REQUIRED_MARKS],
    pub boundary: Boundary,
    pub islands: Vec<Island>,
    pub total_legs: u32,
    pub zone_radius: f32,
}

impl Course {
    /// Build a course, rejecting geometry the core cannot race on
    pub fn new(marks: Vec<Mark>, boundary: Boundary, islands: Vec<Island>) -> Result<Self, CourseError> {
        let found = marks.len();
        let marks: [Mark; REQUIRED_MARKS] = marks
            .get(..REQUIRED_MARKS)
            .and_then(|m| m.try_into().ok())
            .ok_or(CourseError::TooFewMarks {
                found,
                required: REQUIRED_MARKS,
            })?;

        if !(boundary.radius > 0.0) {
            return Err(CourseError::InvalidBoundary {
                radius: boundary.radius,
            });
        }

        if let Some((index, island)) = islands.iter().enumerate().find(|(_, i)| i.vertices.len() < 3) {
            return Err(CourseError::DegenerateIsland {
                index,
                vertices: island.vertices.len(),
            });
        }

        Ok(Self {
            marks,
            boundary,
            islands,
            total_legs: TOTAL_LEGS,
            zone_radius: ZONE_RADIUS,
        })
    }

    /// Windward/leeward layout: start line at the origin, gate `leg_length` upwind
    pub fn standard(wind_direction: f32, leg_length: f32, line_width: f32) -> Self {
        let up = heading_vector(wind_direction);
        let right = Vec2::new(-up.y, up.x);
        let half = right * line_width / 2.0;
        let gate = up * leg_length;

        Self {
            marks: [
                Mark::new(-half, MarkKind::Start),
                Mark::new(half, MarkKind::Start),
                Mark::new(gate - half, MarkKind::Gate),
                Mark::new(gate + half, MarkKind::Gate),
            ],
            boundary: Boundary {
                center: gate / 2.0,
                radius: (leg_length + 500.0).max(3500.0),
            },
            islands: Vec::new(),
            total_legs: TOTAL_LEGS,
            zone_radius: ZONE_RADIUS,
        }
    }

    /// Replace the island set, validating each ring
    pub fn with_islands(mut self, islands: Vec<Island>) -> Result<Self, CourseError> {
        if let Some((index, island)) = islands.iter().enumerate().find(|(_, i)| i.vertices.len() < 3) {
            return Err(CourseError::DegenerateIsland {
                index,
                vertices: island.vertices.len(),
            });
        }
        self.islands = islands;
        Ok(self)
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn start_line(&self) -> (Vec2, Vec2) {
        (self.marks[0].pos, self.marks[1].pos)
    }

    pub fn windward_gate(&self) -> (Vec2, Vec2) {
        (self.marks[2].pos, self.marks[3].pos)
    }

    /// Gate the agent is sailing toward on `leg`
    pub fn gate_for_leg(&self, leg: u32) -> (Vec2, Vec2) {
        if Self::is_upwind_leg(leg) {
            self.windward_gate()
        } else {
            self.start_line()
        }
    }

    #[inline]
    pub fn is_upwind_leg(leg: u32) -> bool {
        leg % 2 == 1
    }

    /// Legs on which mark-room can apply
    pub fn is_rounding_leg(&self, leg: u32) -> bool {
        leg > 0 && leg <= self.total_legs
    }

    /// Whether `pos` is inside the zone of either mark of the active gate
    pub fn in_zone(&self, pos: Vec2, leg: u32) -> bool {
        let (a, b) = self.gate_for_leg(leg);
        pos.distance(a) < self.zone_radius || pos.distance(b) < self.zone_radius
    }
}

/// Race phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    /// Countdown to the gun
    Prestart,
    /// Gun has fired
    Racing,
}

/// Wind at a point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    /// Knots
    pub speed: f32,
    /// Bearing the wind blows from
    pub direction: f32,
}

/// Tidal current
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterCurrent {
    /// Knots
    pub speed: f32,
    /// Bearing the water flows toward
    pub direction: f32,
}

/// Read-only snapshot handed to every controller for one tick
#[derive(Clone, Copy)]
pub struct World<'a> {
    pub phase: RacePhase,
    /// Countdown before the gun, elapsed time after it
    pub race_timer: f32,
    pub course: &'a Course,
    /// Global wind
    pub wind: WindSample,
    /// Nominal wind speed the gusts deviate from
    pub base_wind_speed: f32,
    pub current: Option<WaterCurrent>,
    pub wind_field: &'a dyn WindField,
    pub performance: &'a dyn PerformanceModel,
    pub agents: &'a [Agent],
}

impl World<'_> {
    #[inline]
    pub fn is_racing(&self) -> bool {
        self.phase == RacePhase::Racing
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Every other agent still racing
    pub fn rivals(&self, id: AgentId) -> impl Iterator<Item = &Agent> {
        self.agents
            .iter()
            .filter(move |a| a.id != id && !a.race.finished)
    }
}
