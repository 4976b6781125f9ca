//! Liveness watchdog
//!
//! Tracks how long an agent has been crawling and escalates
//! `Normal -> Recovery -> Force`, loosening the other layers as it goes. It
//! also owns the escape maneuvers. At most one [`Override`] is active, and
//! while it runs it wins over every other heading source.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometry::closest_point_on_polygon;
use super::state::{Agent, World};
use crate::settings::LivenessTuning;
use crate::{bearing, bearing_to, normalize_angle};

/// Escalation level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LivenessState {
    #[default]
    Normal,
    Recovery,
    Force,
}

/// Active escape maneuver
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Override {
    #[default]
    None,
    /// Beam reach to one side (`side` is +1 or -1 from the wind)
    Wiggle { side: f32, remaining: f32 },
    /// Keep sailing the heading a successful wiggle ended on
    Clearance { heading: f32, remaining: f32 },
    /// Steer away from a mark the agent is pinned against
    MarkEscape { heading: f32, remaining: f32 },
}

/// Per-agent watchdog state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Watchdog {
    state: LivenessState,
    /// Continuous time below the stuck speed
    stuck_timer: f32,
    active: Override,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> LivenessState {
        self.state
    }

    #[inline]
    pub fn stuck_time(&self) -> f32 {
        self.stuck_timer
    }

    #[inline]
    pub fn active_override(&self) -> Override {
        self.active
    }

    /// Avoidance is skipped while wiggling so the breakout is not undone
    #[inline]
    pub fn is_wiggling(&self) -> bool {
        matches!(self.active, Override::Wiggle { .. })
    }

    /// Advance the stuck timer and escalation level
    pub fn update_liveness(&mut self, agent: &Agent, world: &World, dt: f32, tuning: &LivenessTuning) {
        if !world.is_racing() {
            self.transition(agent, LivenessState::Normal);
            self.stuck_timer = 0.0;
            return;
        }

        let knots = agent.speed_knots();
        if knots < tuning.stuck_speed_knots {
            self.stuck_timer += dt;
        } else if knots > tuning.recovered_speed_knots {
            self.stuck_timer = 0.0;
        }

        let derived = if agent.race.leg == 0 {
            let elapsed = world.race_timer;
            if elapsed > tuning.start_force_elapsed || self.stuck_timer > tuning.start_force_stuck {
                LivenessState::Force
            } else if elapsed > tuning.start_recovery_elapsed
                || self.stuck_timer > tuning.start_recovery_stuck
            {
                LivenessState::Recovery
            } else {
                LivenessState::Normal
            }
        } else if self.stuck_timer > tuning.stall_force_stuck {
            LivenessState::Force
        } else if self.stuck_timer > tuning.stall_recovery_stuck {
            LivenessState::Recovery
        } else {
            LivenessState::Normal
        };

        // Inside a stuck episode the level only ratchets up
        let next = if self.stuck_timer > 0.0 {
            derived.max(self.state)
        } else {
            derived
        };
        self.transition(agent, next);
    }

    fn transition(&mut self, agent: &Agent, next: LivenessState) {
        if next != self.state {
            log::debug!(
                "Agent {} liveness {:?} -> {:?} (stuck {:.1}s)",
                agent.id,
                self.state,
                next,
                self.stuck_timer
            );
            self.state = next;
        }
    }

    /// Wiggle or clearance heading, when one is in progress
    ///
    /// A wiggle starts once the agent has been stuck long enough. A failed
    /// wiggle retries on the other side; a successful one hands over to a
    /// short clearance hold.
    pub fn steer<R: Rng>(
        &mut self,
        agent: &Agent,
        world: &World,
        dt: f32,
        rng: &mut R,
        tuning: &LivenessTuning,
    ) -> Option<f32> {
        let idle = matches!(self.active, Override::None | Override::Clearance { .. });
        if idle && self.stuck_timer > tuning.wiggle_trigger {
            let side = self.pick_wiggle_side(agent, world, rng, tuning);
            log::debug!("Agent {} wiggling to side {}", agent.id, side);
            self.active = Override::Wiggle {
                side,
                remaining: tuning.wiggle_duration,
            };
        }

        match &mut self.active {
            Override::Wiggle { side, remaining } => {
                *remaining -= dt;
                let heading = normalize_angle(world.wind.direction + *side * tuning.wiggle_wind_offset);
                if *remaining <= 0.0 {
                    if self.stuck_timer > tuning.wiggle_retry_stuck {
                        let side = -*side;
                        log::debug!("Agent {} wiggle failed, retrying on side {}", agent.id, side);
                        self.active = Override::Wiggle {
                            side,
                            remaining: tuning.wiggle_duration,
                        };
                    } else {
                        self.stuck_timer = 0.0;
                        self.active = Override::Clearance {
                            heading,
                            remaining: tuning.clearance_duration,
                        };
                    }
                }
                Some(heading)
            }
            Override::Clearance { heading, remaining } => {
                *remaining -= dt;
                let heading = *heading;
                if *remaining <= 0.0 {
                    self.active = Override::None;
                }
                Some(heading)
            }
            Override::None | Override::MarkEscape { .. } => None,
        }
    }

    /// Side away from the nearest obstacle, or random when nothing is close
    /// or the smart choice has already failed for a while
    fn pick_wiggle_side<R: Rng>(
        &self,
        agent: &Agent,
        world: &World,
        rng: &mut R,
        tuning: &LivenessTuning,
    ) -> f32 {
        let random_side = |rng: &mut R| if rng.random_bool(0.5) { 1.0 } else { -1.0 };
        if self.stuck_timer > tuning.wiggle_random_after {
            return random_side(rng);
        }

        let others = world.agents.iter().filter(|a| a.id != agent.id).map(|a| a.pos);
        let marks = world.course.marks().iter().map(|m| m.pos);
        let islands = world
            .course
            .islands
            .iter()
            .filter_map(|i| closest_point_on_polygon(agent.pos, &i.vertices));
        let nearest = others
            .chain(marks)
            .chain(islands)
            .min_by(|a, b| a.distance_squared(agent.pos).total_cmp(&b.distance_squared(agent.pos)));

        match nearest {
            Some(obstacle) if obstacle.distance(agent.pos) < tuning.wiggle_obstacle_radius => {
                let relative = normalize_angle(bearing_to(agent.pos, obstacle) - agent.heading);
                if relative > 0.0 { -1.0 } else { 1.0 }
            }
            _ => random_side(rng),
        }
    }

    /// Mark-contact latch; pre-empts any wiggle or clearance
    pub fn mark_escape(&mut self, agent: &Agent, dt: f32, tuning: &LivenessTuning) -> Option<f32> {
        let pinned = agent
            .mark_contact
            .filter(|_| agent.speed_knots() < tuning.mark_escape_speed_knots);
        if let Some(normal) = pinned {
            if !matches!(self.active, Override::MarkEscape { .. }) {
                log::debug!("Agent {} pinned on a mark, escaping", agent.id);
            }
            self.active = Override::MarkEscape {
                heading: bearing(-normal),
                remaining: tuning.mark_escape_duration,
            };
        }

        if let Override::MarkEscape { heading, remaining } = &mut self.active {
            *remaining -= dt;
            let heading = *heading;
            if *remaining <= 0.0 {
                self.active = Override::None;
            }
            return Some(heading);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::fixtures::Scene;
    use glam::Vec2;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const DT: f32 = 0.1;

    fn stalled_on_start_leg() -> Scene {
        let mut scene = Scene::new();
        scene.add(1, Vec2::new(0.0, 300.0), 0.0, 0.0).race.leg = 0;
        scene
    }

    #[test]
    fn test_forced_liveness_on_start_leg() {
        let mut scene = stalled_on_start_leg();
        let tuning = LivenessTuning::default();
        let mut watchdog = Watchdog::new();

        let mut seen_recovery = false;
        for _ in 0..110 {
            scene.race_timer += DT;
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
            seen_recovery |= watchdog.state() == LivenessState::Recovery;
        }
        assert!(watchdog.stuck_time() > tuning.start_force_stuck);
        assert_eq!(watchdog.state(), LivenessState::Force);
        assert!(seen_recovery);
    }

    #[test]
    fn test_speed_recovery_resets() {
        let mut scene = stalled_on_start_leg();
        let tuning = LivenessTuning::default();
        let mut watchdog = Watchdog::new();
        for _ in 0..70 {
            scene.race_timer += DT;
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
        }
        assert_eq!(watchdog.state(), LivenessState::Recovery);

        scene.agent_mut(1).speed = 60.0; // 4 kn, above the hysteresis band
        let world = scene.world();
        watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
        assert_eq!(watchdog.stuck_time(), 0.0);
        assert_eq!(watchdog.state(), LivenessState::Normal);
    }

    #[test]
    fn test_later_legs_need_serious_stall() {
        let mut scene = Scene::new();
        scene.add(1, Vec2::ZERO, 0.0, 0.0);
        scene.race_timer = 300.0;
        let tuning = LivenessTuning::default();
        let mut watchdog = Watchdog::new();

        for _ in 0..100 {
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
        }
        assert_eq!(watchdog.state(), LivenessState::Normal);

        for _ in 0..60 {
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
        }
        assert_eq!(watchdog.state(), LivenessState::Recovery);
    }

    #[test]
    fn test_prestart_never_escalates() {
        let mut scene = stalled_on_start_leg();
        scene.phase = crate::sim::state::RacePhase::Prestart;
        let tuning = LivenessTuning::default();
        let mut watchdog = Watchdog::new();
        for _ in 0..200 {
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
        }
        assert_eq!(watchdog.state(), LivenessState::Normal);
        assert_eq!(watchdog.stuck_time(), 0.0);
    }

    #[test]
    fn test_wiggle_steers_away_from_close_obstacle() {
        let mut scene = Scene::new();
        scene.add(1, Vec2::new(0.0, -2000.0), 0.0, 0.0);
        // Rival just off the starboard bow
        scene.add(2, Vec2::new(40.0, -2040.0), 0.0, 0.0);
        let tuning = LivenessTuning::default();
        let mut watchdog = Watchdog::new();
        let mut rng = Pcg32::seed_from_u64(7);

        let mut heading = None;
        for _ in 0..35 {
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
            heading = watchdog.steer(&world.agents[0], &world, DT, &mut rng, &tuning);
        }
        assert!(watchdog.is_wiggling());
        let heading = heading.unwrap();
        assert!((heading + tuning.wiggle_wind_offset).abs() < 1e-4);
    }

    #[test]
    fn test_failed_wiggle_retries_other_side() {
        let mut scene = Scene::new();
        scene.add(1, Vec2::new(0.0, -2000.0), 0.0, 0.0);
        let tuning = LivenessTuning::default();
        let mut watchdog = Watchdog::new();
        let mut rng = Pcg32::seed_from_u64(3);

        let mut first_side = None;
        for _ in 0..200 {
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
            watchdog.steer(&world.agents[0], &world, DT, &mut rng, &tuning);
            if let Override::Wiggle { side, .. } = watchdog.active_override() {
                match first_side {
                    None => first_side = Some(side),
                    Some(first) if side != first => return,
                    _ => {}
                }
            }
        }
        panic!("wiggle never flipped side");
    }

    #[test]
    fn test_successful_wiggle_enters_clearance() {
        let mut scene = Scene::new();
        scene.add(1, Vec2::new(0.0, -2000.0), 0.0, 0.0);
        let tuning = LivenessTuning::default();
        let mut watchdog = Watchdog::new();
        let mut rng = Pcg32::seed_from_u64(11);

        // Stuck long enough to trigger a wiggle
        for _ in 0..31 {
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
            watchdog.steer(&world.agents[0], &world, DT, &mut rng, &tuning);
        }
        assert!(watchdog.is_wiggling());

        // Boat gets going; the wiggle runs out with little stuck time left
        scene.agent_mut(1).speed = 60.0;
        for _ in 0..60 {
            let world = scene.world();
            watchdog.update_liveness(&world.agents[0], &world, DT, &tuning);
            watchdog.steer(&world.agents[0], &world, DT, &mut rng, &tuning);
            if matches!(watchdog.active_override(), Override::Clearance { .. }) {
                return;
            }
        }
        panic!("expected a clearance hold");
    }

    #[test]
    fn test_mark_escape_latch() {
        let mut scene = Scene::new();
        let agent = scene.add(1, Vec2::new(-300.0, 0.0), 0.0, 0.0);
        agent.mark_contact = Some(Vec2::X); // Mark lies to the east
        let tuning = LivenessTuning::default();
        let mut watchdog = Watchdog::new();

        let world = scene.world();
        let heading = watchdog.mark_escape(&world.agents[0], DT, &tuning).unwrap();
        assert!((heading + std::f32::consts::FRAC_PI_2).abs() < 1e-5);

        // Contact cleared, latch still holds
        scene.agent_mut(1).mark_contact = None;
        let world = scene.world();
        assert!(watchdog.mark_escape(&world.agents[0], DT, &tuning).is_some());
        for _ in 0..25 {
            watchdog.mark_escape(&world.agents[0], DT, &tuning);
        }
        assert!(watchdog.mark_escape(&world.agents[0], DT, &tuning).is_none());
    }

    proptest! {
        /// Property: within one stuck episode the level never drops
        #[test]
        fn prop_liveness_monotonic(
            speeds in prop::collection::vec(0.0f32..60.0, 1..400),
            leg in 0u32..3,
        ) {
            let mut scene = Scene::new();
            scene.add(1, Vec2::new(0.0, -2000.0), 0.0, 0.0).race.leg = leg;
            let tuning = LivenessTuning::default();
            let mut watchdog = Watchdog::new();

            for speed in speeds {
                scene.race_timer += 0.5;
                scene.agent_mut(1).speed = speed;
                let before = watchdog.state();
                let world = scene.world();
                watchdog.update_liveness(&world.agents[0], &world, 0.5, &tuning);
                if watchdog.stuck_time() > 0.0 {
                    prop_assert!(watchdog.state() >= before);
                }
            }
        }
    }
}
