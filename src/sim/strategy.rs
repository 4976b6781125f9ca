//! Strategic heading planning
//!
//! Turns a destination into the heading to sail: crab against current, sail
//! straight when the target is fetchable, otherwise pick a tack by scoring
//! both with a short speed ramp and a look at the pressure ahead.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{Agent, Tack, World};
use super::watchdog::LivenessState;
use crate::settings::StrategyTuning;
use crate::{bearing, bearing_to, heading_vector, knots_to_units, normalize_angle};

/// Point-of-sail zone of the wanted track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SailingZone {
    Upwind,
    Reach,
    Downwind,
}

/// Tack choice with its cooldown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TackPlanner {
    cooldown: f32,
}

impl TackPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cooldown(&self) -> f32 {
        self.cooldown
    }

    /// Count the cooldown down; called every decision tick
    pub fn tick(&mut self, dt: f32) {
        self.cooldown = (self.cooldown - dt).max(0.0);
    }

    /// Heading that best makes progress toward `target`
    pub fn heading(
        &mut self,
        agent: &Agent,
        target: Vec2,
        world: &World,
        liveness: LivenessState,
        tuning: &StrategyTuning,
    ) -> f32 {
        let wind = world.wind_field.wind_at(agent.pos);
        let wd = wind.direction;
        let to_target = bearing_to(agent.pos, target);

        if liveness != LivenessState::Normal {
            return escape_heading(to_target, wd, tuning);
        }

        let compensated = crab_heading(agent, to_target, world, tuning);
        let twa = normalize_angle(compensated - wd);
        let (zone, optimal) = classify_zone(twa.abs(), world.wind.speed, tuning);

        let fetchable = match zone {
            SailingZone::Reach => true,
            SailingZone::Upwind => twa.abs() > optimal,
            SailingZone::Downwind => twa.abs() < optimal,
        };
        if fetchable {
            return compensated;
        }

        let starboard = normalize_angle(wd + optimal);
        let port = normalize_angle(wd - optimal);
        let heading_for = |tack: Tack| match tack {
            Tack::Starboard => starboard,
            Tack::Port => port,
        };

        let score_starboard = score_tack(agent, starboard, to_target, world, tuning);
        let score_port = score_tack(agent, port, to_target, world, tuning);

        let current_tack = Tack::from_heading(agent.heading, wd);
        let preferred = match current_tack {
            Tack::Starboard if score_starboard + tuning.tack_hysteresis > score_port => Tack::Starboard,
            Tack::Port if score_port + tuning.tack_hysteresis > score_starboard => Tack::Port,
            _ if score_starboard > score_port => Tack::Starboard,
            _ => Tack::Port,
        };

        // Tack onto the layline rather than overstand it
        let other = match preferred {
            Tack::Starboard => Tack::Port,
            Tack::Port => Tack::Starboard,
        };
        let speed = agent.speed.max(tuning.layline_speed_floor);
        let other_cog = course_over_ground(heading_for(other), speed, world, tuning).0;
        if normalize_angle(other_cog - to_target).abs() < tuning.layline_tolerance && self.cooldown <= 0.0 {
            log::trace!("Agent {} tacking on the layline", agent.id);
            self.cooldown = tuning.layline_cooldown;
            return heading_for(other);
        }

        if preferred != current_tack {
            if self.cooldown > 0.0 {
                return heading_for(current_tack);
            }
            self.cooldown = tuning.switch_cooldown;
        }
        heading_for(preferred)
    }
}

/// Robust fallback while escalated: straight at the target, or close-hauled
/// on the tack that points nearer to it
fn escape_heading(to_target: f32, wd: f32, tuning: &StrategyTuning) -> f32 {
    let twa = normalize_angle(to_target - wd);
    if twa.abs() > tuning.fallback_direct_twa {
        return to_target;
    }
    let side = if twa > 0.0 { 1.0 } else { -1.0 };
    normalize_angle(wd + side * tuning.fallback_wind_offset)
}

/// Heading whose course over ground points at the target
///
/// Cross-track current is cancelled by steering up into it; when the current
/// is too strong for the boat the bare bearing is returned.
fn crab_heading(agent: &Agent, to_target: f32, world: &World, tuning: &StrategyTuning) -> f32 {
    let Some(current) = world.current.filter(|c| c.speed > tuning.current_threshold) else {
        return to_target;
    };
    let current_speed = knots_to_units(current.speed);
    let boat_speed = agent.speed.max(tuning.crab_speed_floor);

    let cross = normalize_angle(current.direction - to_target).sin() * current_speed;
    let ratio = -cross / boat_speed;
    if ratio.abs() < tuning.crab_ratio_limit {
        normalize_angle(to_target + ratio.asin())
    } else {
        to_target
    }
}

fn classify_zone(abs_twa: f32, wind_speed: f32, tuning: &StrategyTuning) -> (SailingZone, f32) {
    if abs_twa < tuning.upwind_zone {
        (SailingZone::Upwind, tuning.upwind_optimal)
    } else if abs_twa > tuning.downwind_zone {
        let optimal = if wind_speed > tuning.planing_wind {
            tuning.downwind_optimal_planing
        } else {
            tuning.downwind_optimal
        };
        (SailingZone::Downwind, optimal)
    } else {
        (SailingZone::Reach, tuning.upwind_optimal)
    }
}

/// Course and speed over ground (units/s) for a heading and water speed
///
/// Currents at or below the threshold are ignored, as in `crab_heading`.
fn course_over_ground(heading: f32, speed: f32, world: &World, tuning: &StrategyTuning) -> (f32, f32) {
    let mut velocity = heading_vector(heading) * speed;
    if let Some(current) = world.current.filter(|c| c.speed > tuning.current_threshold) {
        velocity += heading_vector(current.direction) * knots_to_units(current.speed);
    }
    (bearing(velocity), velocity.length())
}

/// Wind speed as felt by a boat that amplifies gusts and lulls
fn effective_wind(speed: f32, base: f32, boost: f32) -> f32 {
    let factor = boost * 0.05;
    if speed > base {
        base + (speed - base) * (1.0 + factor)
    } else {
        base + (speed - base) * (1.0 - factor)
    }
}

/// Progress toward the target on one tack, in knots
fn score_tack(agent: &Agent, heading: f32, to_target: f32, world: &World, tuning: &StrategyTuning) -> f32 {
    let stats = &agent.stats;
    let wind = world.wind_field.wind_at(agent.pos);
    let base = world.base_wind_speed;

    // Polar target adjusted for this boat
    let twa = normalize_angle(heading - wind.direction).abs();
    let twa_deg = twa.to_degrees();
    let spinnaker = twa_deg > 90.0;
    let mut target = world
        .performance
        .target_speed(twa, spinnaker, effective_wind(wind.speed, base, stats.boost));
    let point_of_sail = if twa_deg <= 60.0 {
        stats.upwind * 0.008
    } else if twa_deg >= 145.0 {
        stats.downwind * 0.01
    } else {
        stats.reach * 0.012
    };
    target *= 1.0 + point_of_sail;

    // A few seconds of acceleration toward it
    let start = agent.speed_knots();
    let alpha = if target > start {
        tuning.ramp_alpha * (1.0 + stats.acceleration * 0.024)
    } else {
        tuning.ramp_alpha * (1.0 - stats.momentum * 0.02)
    };
    let steps = tuning.ramp_steps.max(1);
    let mut speed = start;
    let mut total = 0.0;
    for _ in 0..steps {
        speed = speed * (1.0 - alpha) + target * alpha;
        total += speed;
    }
    let average = total / steps as f32;

    // Progress over ground, scored in knots
    let (cog, sog_units) = course_over_ground(heading, knots_to_units(average), world, tuning);
    let sog = crate::units_to_knots(sog_units);
    let mut score = normalize_angle(cog - to_target).cos() * sog;

    // Pressure scouting at the projected position
    let ahead = agent.pos + heading_vector(cog) * sog_units * steps as f32;
    let future = effective_wind(world.wind_field.wind_at(ahead).speed, base, stats.boost);
    score += (future - base) * tuning.pressure_weight;
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::fixtures::Scene;
    use crate::sim::state::WaterCurrent;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    const ORIGIN: Vec2 = Vec2::new(0.0, -2000.0);

    fn target_at(bearing: f32, distance: f32) -> Vec2 {
        ORIGIN + heading_vector(bearing) * distance
    }

    #[test]
    fn test_reach_sails_straight() {
        let mut scene = Scene::new();
        scene.add(1, ORIGIN, FRAC_PI_2, 90.0);
        let world = scene.world();
        let mut planner = TackPlanner::new();
        let h = planner.heading(
            &world.agents[0],
            target_at(FRAC_PI_2, 1000.0),
            &world,
            LivenessState::Normal,
            &StrategyTuning::default(),
        );
        assert!((h - FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn test_dead_upwind_target_sails_close_hauled() {
        let mut scene = Scene::new();
        scene.add(1, ORIGIN, 0.6, 90.0);
        let world = scene.world();
        let tuning = StrategyTuning::default();
        let mut planner = TackPlanner::new();
        let h = planner.heading(&world.agents[0], target_at(0.0, 1500.0), &world, LivenessState::Normal, &tuning);
        // Already on starboard, the symmetric choice keeps it
        assert!((h - tuning.upwind_optimal).abs() < 1e-4);
        assert_eq!(planner.cooldown(), 0.0);
    }

    #[test]
    fn test_downwind_gybes_with_planing_angle() {
        let mut scene = Scene::new().with_wind_speed(16.0);
        scene.add(1, ORIGIN, 2.5, 120.0);
        let world = scene.world();
        let tuning = StrategyTuning::default();
        let mut planner = TackPlanner::new();
        let h = planner.heading(
            &world.agents[0],
            target_at(std::f32::consts::PI, 1500.0),
            &world,
            LivenessState::Normal,
            &tuning,
        );
        assert!((h.abs() - tuning.downwind_optimal_planing).abs() < 1e-4);
    }

    #[test]
    fn test_switch_sets_cooldown_and_cooldown_holds_tack() {
        let mut scene = Scene::new();
        // On port, target well to the starboard side of the wind
        scene.add(1, ORIGIN, -FRAC_PI_4, 90.0);
        let world = scene.world();
        let tuning = StrategyTuning::default();
        let target = target_at(0.5, 1500.0);

        let mut planner = TackPlanner::new();
        let h = planner.heading(&world.agents[0], target, &world, LivenessState::Normal, &tuning);
        assert!((h - tuning.upwind_optimal).abs() < 1e-4);
        assert_eq!(planner.cooldown(), tuning.switch_cooldown);

        // While cooling down the current tack is held
        let mut held = TackPlanner { cooldown: 3.0 };
        let h = held.heading(&world.agents[0], target, &world, LivenessState::Normal, &tuning);
        assert!((h + tuning.upwind_optimal).abs() < 1e-4);
    }

    #[test]
    fn test_layline_tack() {
        // Light air keeps both tack scores within the hysteresis band, so the
        // layline check decides
        let mut scene = Scene::new().with_wind_speed(1.0);
        scene.add(1, ORIGIN, FRAC_PI_4, 0.0);
        let world = scene.world();
        let tuning = StrategyTuning::default();
        let mut planner = TackPlanner::new();
        let h = planner.heading(&world.agents[0], target_at(-0.76, 1500.0), &world, LivenessState::Normal, &tuning);
        assert!((h + tuning.upwind_optimal).abs() < 1e-4);
        assert_eq!(planner.cooldown(), tuning.layline_cooldown);
    }

    #[test]
    fn test_recovery_bias_off_the_wind() {
        let mut scene = Scene::new();
        scene.add(1, ORIGIN, 0.0, 0.0);
        let world = scene.world();
        let tuning = StrategyTuning::default();
        let mut planner = TackPlanner::new();

        let h = planner.heading(&world.agents[0], target_at(0.2, 800.0), &world, LivenessState::Recovery, &tuning);
        assert!((h - tuning.fallback_wind_offset).abs() < 1e-4);

        let h = planner.heading(&world.agents[0], target_at(-1.5, 800.0), &world, LivenessState::Force, &tuning);
        assert!((h + 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_crab_into_cross_current() {
        let mut scene = Scene::new();
        scene.current = Some(WaterCurrent {
            speed: 2.0,
            direction: 0.0,
        });
        scene.add(1, ORIGIN, FRAC_PI_2, 90.0);
        let world = scene.world();
        let mut planner = TackPlanner::new();
        let h = planner.heading(
            &world.agents[0],
            target_at(FRAC_PI_2, 1000.0),
            &world,
            LivenessState::Normal,
            &StrategyTuning::default(),
        );
        // Current sets north, so the bow points south of east
        assert!((h - (FRAC_PI_2 + (30.0f32 / 90.0).asin())).abs() < 1e-3);

        let (cog, _) = course_over_ground(h, 90.0, &world, &StrategyTuning::default());
        assert!((cog - FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn test_slack_current_leaves_course_over_ground() {
        let tuning = StrategyTuning::default();
        let mut scene = Scene::new();
        scene.current = Some(WaterCurrent {
            speed: tuning.current_threshold,
            direction: 0.0,
        });
        scene.add(1, ORIGIN, FRAC_PI_2, 90.0);
        let world = scene.world();

        let (cog, sog) = course_over_ground(FRAC_PI_2, 90.0, &world, &tuning);
        assert!((cog - FRAC_PI_2).abs() < 1e-6);
        assert!((sog - 90.0).abs() < 1e-4);

        // Just over the threshold the set shows up
        scene.current = Some(WaterCurrent {
            speed: tuning.current_threshold * 2.0,
            direction: 0.0,
        });
        let world = scene.world();
        let (cog, _) = course_over_ground(FRAC_PI_2, 90.0, &world, &tuning);
        assert!(cog < FRAC_PI_2 - 1e-3);
    }

    #[test]
    fn test_effective_wind_boost() {
        assert_eq!(effective_wind(14.0, 12.0, 0.0), 14.0);
        assert!((effective_wind(14.0, 12.0, 2.0) - 14.2).abs() < 1e-5);
        assert!((effective_wind(10.0, 12.0, 2.0) - 10.2).abs() < 1e-5);
    }
}
