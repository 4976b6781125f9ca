//! Right-of-way resolution between two agents
//!
//! A simplified precedence ladder, evaluated top to bottom:
//! mark-room, tacking, opposite tacks, clear ahead, leeward.
//!
//! `resolve(a, b)` and `resolve(b, a)` always name the same winner. Every
//! geometric tie falls back to the lower agent id rather than argument order.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{Agent, AgentId, Course, World};
use crate::consts::{HULL_BOW_OFFSET, HULL_STERN_OFFSET};
use crate::heading_vector;

/// Rule that decided a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    /// Only one agent is inside the mark zone
    MarkRoomZone,
    /// Both in the zone and overlapped: the inside agent wins
    MarkRoomInside,
    /// Both in the zone, not overlapped: the clear-ahead agent wins
    MarkRoomClearAhead,
    /// An agent that is tacking keeps clear
    Tacking,
    /// Starboard tack holds over port tack
    OppositeTacks,
    /// Same tack, the clear-ahead agent wins
    ClearAhead,
    /// Same tack, overlapped: the leeward agent wins
    Leeward,
}

impl Rule {
    /// Racing-rules number, for diagnostics
    pub fn code(self) -> &'static str {
        match self {
            Rule::MarkRoomZone | Rule::MarkRoomInside | Rule::MarkRoomClearAhead => "Rule 18",
            Rule::Tacking => "Rule 13",
            Rule::OppositeTacks => "Rule 10",
            Rule::ClearAhead => "Rule 12",
            Rule::Leeward => "Rule 11",
        }
    }
}

/// Outcome of a pairwise resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightOfWayVerdict {
    pub winner: AgentId,
    pub rule: Rule,
}

impl RightOfWayVerdict {
    #[inline]
    pub fn holds_right_of_way(&self, id: AgentId) -> bool {
        self.winner == id
    }
}

/// Shared race state the resolver reads
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub racing: bool,
    /// Bearing the wind blows from
    pub wind_direction: f32,
    pub course: &'a Course,
}

impl<'a> RuleContext<'a> {
    pub fn from_world(world: &World<'a>) -> Self {
        Self {
            racing: world.is_racing(),
            wind_direction: world.wind.direction,
            course: world.course,
        }
    }
}

/// Whether `behind` is clear astern of `ahead`
///
/// True when the bow of `behind` is aft of the line abeam of the stern of
/// `ahead`.
pub fn clear_astern(behind: &Agent, ahead: &Agent) -> bool {
    let ahead_fwd = heading_vector(ahead.heading);
    let stern = ahead.pos - ahead_fwd * HULL_STERN_OFFSET;
    let bow = behind.pos + heading_vector(behind.heading) * HULL_BOW_OFFSET;
    (bow - stern).dot(ahead_fwd) < 0.0
}

/// Resolve which of two agents holds right of way
///
/// Returns `None` only for the same agent passed twice; callers treat that as
/// no constraint.
pub fn resolve(a: &Agent, b: &Agent, ctx: &RuleContext) -> Option<RightOfWayVerdict> {
    if a.id == b.id {
        return None;
    }
    let verdict = |winner: &Agent, rule| Some(RightOfWayVerdict { winner: winner.id, rule });
    let tie_break = |rule| {
        Some(RightOfWayVerdict {
            winner: a.id.min(b.id),
            rule,
        })
    };

    let (tack_a, tack_b) = (a.tack(), b.tack());
    let opposite_tacks = tack_a != tack_b;

    // 1. Mark-room
    if mark_room_applies(a, b, opposite_tacks, ctx) {
        if a.race.in_zone != b.race.in_zone {
            let winner = if a.race.in_zone { a } else { b };
            return verdict(winner, Rule::MarkRoomZone);
        }

        match (clear_astern(a, b), clear_astern(b, a)) {
            (true, false) => return verdict(b, Rule::MarkRoomClearAhead),
            (false, true) => return verdict(a, Rule::MarkRoomClearAhead),
            _ => {
                // Overlapped: closer to the rounding mark is inside
                let mark = rounding_mark(ctx.course, a.race.leg, (a.pos + b.pos) * 0.5);
                let (da, db) = (a.pos.distance_squared(mark), b.pos.distance_squared(mark));
                return if da < db {
                    verdict(a, Rule::MarkRoomInside)
                } else if db < da {
                    verdict(b, Rule::MarkRoomInside)
                } else {
                    tie_break(Rule::MarkRoomInside)
                };
            }
        }
    }

    // 2. Tacking
    if a.race.is_tacking != b.race.is_tacking {
        let winner = if a.race.is_tacking { b } else { a };
        return verdict(winner, Rule::Tacking);
    }

    // 3. Opposite tacks
    if opposite_tacks {
        let winner = if tack_a.sign() > 0.0 { a } else { b };
        return verdict(winner, Rule::OppositeTacks);
    }

    // 4. Same tack, not overlapped
    match (clear_astern(a, b), clear_astern(b, a)) {
        (true, false) => return verdict(b, Rule::ClearAhead),
        (false, true) => return verdict(a, Rule::ClearAhead),
        _ => {}
    }

    // 5. Same tack, overlapped: leeward wins.
    // Looking upwind, cross > 0 puts `b` to the left of `a`. The boom lies on
    // the leeward side, so starboard (boom right) is windward to the left.
    let flow = -heading_vector(ctx.wind_direction);
    let cross = flow.perp_dot(b.pos - a.pos);
    if cross == 0.0 {
        return tie_break(Rule::Leeward);
    }
    let b_windward = cross * tack_a.sign() > 0.0;
    verdict(if b_windward { a } else { b }, Rule::Leeward)
}

/// Mark-room is live while racing, both agents round the same mark, and the
/// pair is not crossing on opposite tacks on a beat
fn mark_room_applies(a: &Agent, b: &Agent, opposite_tacks: bool, ctx: &RuleContext) -> bool {
    let leg = a.race.leg;
    ctx.racing
        && a.race.leg == b.race.leg
        && ctx.course.is_rounding_leg(leg)
        && !(Course::is_upwind_leg(leg) && opposite_tacks)
        && (a.race.in_zone || b.race.in_zone)
}

/// Active gate mark nearest to `near`
fn rounding_mark(course: &Course, leg: u32, near: Vec2) -> Vec2 {
    let (m1, m2) = course.gate_for_leg(leg);
    if near.distance_squared(m1) <= near.distance_squared(m2) { m1 } else { m2 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn course() -> Course {
        Course::standard(0.0, 4000.0, 550.0)
    }

    fn agent(id: AgentId, pos: Vec2, heading: f32, boom_side: f32) -> Agent {
        let mut agent = Agent::new(id, pos, heading);
        agent.boom_side = boom_side;
        agent
    }

    fn ctx(course: &Course, racing: bool) -> RuleContext<'_> {
        RuleContext {
            racing,
            wind_direction: 0.0,
            course,
        }
    }

    #[test]
    fn test_opposite_tacks_scenario() {
        let course = course();
        let a = agent(1, Vec2::ZERO, 0.0, 1.0);
        let b = agent(2, Vec2::new(50.0, 50.0), 0.0, -1.0);
        let v = resolve(&a, &b, &ctx(&course, true)).unwrap();
        assert_eq!(v.winner, 1);
        assert_eq!(v.rule, Rule::OppositeTacks);
        assert_eq!(v.rule.code(), "Rule 10");
        assert_eq!(resolve(&b, &a, &ctx(&course, true)).unwrap().winner, 1);
    }

    #[test]
    fn test_same_agent_is_no_constraint() {
        let course = course();
        let a = agent(1, Vec2::ZERO, 0.0, 1.0);
        assert!(resolve(&a, &a, &ctx(&course, true)).is_none());
    }

    #[test]
    fn test_tacking_agent_keeps_clear() {
        let course = course();
        // The tacking agent is on starboard and would otherwise win
        let a = agent(1, Vec2::ZERO, 0.5, -1.0);
        let mut b = agent(2, Vec2::new(40.0, 0.0), 0.5, 1.0);
        b.race.is_tacking = true;
        let v = resolve(&a, &b, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (1, Rule::Tacking));
        assert_eq!(resolve(&b, &a, &ctx(&course, true)).unwrap().winner, 1);

        // Clear ahead does not help either
        let east = std::f32::consts::FRAC_PI_2;
        let behind = agent(1, Vec2::ZERO, east, 1.0);
        let mut ahead = agent(2, Vec2::new(200.0, 0.0), east, 1.0);
        ahead.race.is_tacking = true;
        let v = resolve(&behind, &ahead, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (1, Rule::Tacking));

        // Once the tack is complete starboard wins again
        b.race.is_tacking = false;
        let v = resolve(&a, &b, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (2, Rule::OppositeTacks));
    }

    #[test]
    fn test_clear_ahead_wins() {
        let course = course();
        // Both heading east on starboard, b well ahead
        let a = agent(1, Vec2::ZERO, std::f32::consts::FRAC_PI_2, 1.0);
        let b = agent(2, Vec2::new(200.0, 10.0), std::f32::consts::FRAC_PI_2, 1.0);
        assert!(clear_astern(&a, &b));
        assert!(!clear_astern(&b, &a));
        let v = resolve(&a, &b, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (2, Rule::ClearAhead));
    }

    #[test]
    fn test_leeward_wins_when_overlapped() {
        let course = course();
        let quarter = std::f32::consts::FRAC_PI_4;
        // Wind from north, both close-hauled on starboard (boom right),
        // abeam of each other. The agent on the boom side is leeward.
        let windward = agent(1, Vec2::ZERO, quarter, 1.0);
        let leeward = agent(2, Vec2::new(56.6, 56.6), quarter, 1.0);
        let v = resolve(&windward, &leeward, &ctx(&course, false)).unwrap();
        assert_eq!((v.winner, v.rule), (2, Rule::Leeward));

        // Mirror image on port
        let windward = agent(1, Vec2::ZERO, -quarter, -1.0);
        let leeward = agent(2, Vec2::new(-56.6, 56.6), -quarter, -1.0);
        let v = resolve(&leeward, &windward, &ctx(&course, false)).unwrap();
        assert_eq!((v.winner, v.rule), (2, Rule::Leeward));
    }

    #[test]
    fn test_zone_entry_beats_starboard() {
        let course = course();
        let (m1, _) = course.start_line();
        // Leg 2 (downwind to the leeward gate)
        let mut a = agent(1, m1 + Vec2::new(0.0, -80.0), 3.0, -1.0);
        let mut b = agent(2, m1 + Vec2::new(300.0, -300.0), 3.0, 1.0);
        a.race.leg = 2;
        b.race.leg = 2;
        a.race.in_zone = true;
        let v = resolve(&a, &b, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (1, Rule::MarkRoomZone));

        // Not racing: falls through to opposite tacks
        let v = resolve(&a, &b, &ctx(&course, false)).unwrap();
        assert_eq!((v.winner, v.rule), (2, Rule::OppositeTacks));
    }

    #[test]
    fn test_mark_room_suppressed_on_upwind_opposite_tacks() {
        let course = course();
        let (m1, _) = course.windward_gate();
        let mut a = agent(1, m1 + Vec2::new(0.0, 80.0), 0.5, -1.0);
        let mut b = agent(2, m1 + Vec2::new(60.0, 120.0), -0.5, 1.0);
        a.race.leg = 1;
        b.race.leg = 1;
        a.race.in_zone = true;
        b.race.in_zone = true;
        let v = resolve(&a, &b, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (2, Rule::OppositeTacks));
    }

    #[test]
    fn test_inside_agent_wins_mark_room() {
        let course = course();
        let (m1, _) = course.start_line();
        // Overlapped, both in zone, same tack, leg 2
        let heading = std::f32::consts::PI;
        let mut inside = agent(1, m1 + Vec2::new(30.0, -60.0), heading, 1.0);
        let mut outside = agent(2, m1 + Vec2::new(90.0, -60.0), heading, 1.0);
        for a in [&mut inside, &mut outside] {
            a.race.leg = 2;
            a.race.in_zone = true;
        }
        let v = resolve(&outside, &inside, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (1, Rule::MarkRoomInside));
    }

    #[test]
    fn test_clear_ahead_gets_mark_room_over_inside() {
        let course = course();
        let (m1, _) = course.start_line();
        // Running south to the leeward gate, same tack, both in the zone.
        // The trailing agent is nearer the mark but clear astern.
        let heading = std::f32::consts::PI;
        let mut behind = agent(1, m1 + Vec2::new(10.0, -150.0), heading, 1.0);
        let mut ahead = agent(2, m1 + Vec2::new(150.0, -30.0), heading, 1.0);
        for a in [&mut behind, &mut ahead] {
            a.race.leg = 2;
            a.race.in_zone = true;
        }
        assert!(behind.pos.distance(m1) < ahead.pos.distance(m1));
        assert!(clear_astern(&behind, &ahead));

        let v = resolve(&behind, &ahead, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (2, Rule::MarkRoomClearAhead));
        let v = resolve(&ahead, &behind, &ctx(&course, true)).unwrap();
        assert_eq!((v.winner, v.rule), (2, Rule::MarkRoomClearAhead));
    }

    fn arb_agent(id: AgentId) -> impl Strategy<Value = Agent> {
        (
            -400.0f32..400.0,
            -400.0f32..400.0,
            -3.14f32..3.14,
            prop::bool::ANY,
            prop::bool::ANY,
            prop::bool::ANY,
            0u32..6,
        )
            .prop_map(move |(x, y, heading, starboard, tacking, in_zone, leg)| {
                let mut agent = agent(id, Vec2::new(x, y), heading, if starboard { 1.0 } else { -1.0 });
                agent.race.is_tacking = tacking;
                agent.race.in_zone = in_zone;
                agent.race.leg = leg;
                agent
            })
    }

    proptest! {
        /// Property: both argument orders name the same winner
        #[test]
        fn prop_resolve_is_antisymmetric(
            a in arb_agent(1),
            b in arb_agent(2),
            racing in prop::bool::ANY,
            wind in -3.14f32..3.14,
        ) {
            let course = course();
            let ctx = RuleContext { racing, wind_direction: wind, course: &course };
            let ab = resolve(&a, &b, &ctx).unwrap();
            let ba = resolve(&b, &a, &ctx).unwrap();
            prop_assert_eq!(ab.winner, ba.winner);
            prop_assert_eq!(ab.rule, ba.rule);
        }

        /// Property: starboard beats port regardless of position
        #[test]
        fn prop_starboard_precedence(
            x in -500.0f32..500.0,
            y in -500.0f32..500.0,
            ha in -3.14f32..3.14,
            hb in -3.14f32..3.14,
        ) {
            let course = course();
            let ctx = RuleContext { racing: false, wind_direction: 0.0, course: &course };
            let port = agent(1, Vec2::ZERO, ha, -1.0);
            let starboard = agent(2, Vec2::new(x, y), hb, 1.0);
            let v = resolve(&port, &starboard, &ctx).unwrap();
            prop_assert_eq!(v.winner, 2);
        }

        /// Property: among overlapped same-tack agents the leeward one wins
        #[test]
        fn prop_leeward_precedence(
            offset in 30.0f32..60.0,
            along in -5.0f32..5.0,
            wind in -3.14f32..3.14,
            angle in 0.6f32..1.2,
            starboard in prop::bool::ANY,
        ) {
            let course = course();
            let ctx = RuleContext { racing: false, wind_direction: wind, course: &course };
            let boom = if starboard { 1.0 } else { -1.0 };
            let heading = crate::normalize_angle(wind + boom * angle);
            let fwd = heading_vector(heading);
            // Boom side of the windward agent is its leeward side
            let boom_side = heading_vector(heading + boom * std::f32::consts::FRAC_PI_2);
            let windward = agent(1, Vec2::ZERO, heading, boom);
            let leeward = agent(2, boom_side * offset + fwd * along, heading, boom);
            let v = resolve(&windward, &leeward, &ctx).unwrap();
            prop_assert_eq!(v.rule, Rule::Leeward);
            prop_assert_eq!(v.winner, 2);
        }
    }
}
