//! Regatta AI headless demo
//!
//! Sails a small fleet around the standard windward/leeward course with an
//! island on the first beat. Boat motion is a toy kinematic model; every
//! helm decision comes from the decision core.
//!
//! Usage: `regatta-ai [tuning.json]`

use anyhow::{Context, Result};
use glam::Vec2;

use regatta_ai::consts::{SIM_DT, UNITS_PER_KNOT};
use regatta_ai::sim::{
    Agent, Course, Fleet, HelmCommand, Island, PerformanceModel, PolarTable, RacePhase, Tack,
    UniformWind, WindSample, World, tick,
};
use regatta_ai::{Tuning, heading_vector, normalize_angle};

const FLEET_SIZE: u32 = 6;
const SEED: u64 = 20_240_611;
const COUNTDOWN: f32 = 60.0;
const TIME_LIMIT: f32 = 1200.0;
/// Radians per second
const TURN_RATE: f32 = 1.2;
/// Fraction of the speed gap closed per second
const SPEED_RESPONSE: f32 = 0.5;
/// Closer than this to a mark counts as contact
const MARK_CONTACT: f32 = 15.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let tuning = match std::env::args().nth(1) {
        Some(path) => Tuning::load(&path).with_context(|| format!("failed to load tuning from {path}"))?,
        None => Tuning::default(),
    };

    let wind = WindSample {
        speed: 12.0,
        direction: 0.0,
    };
    let course = Course::standard(wind.direction, 4000.0, 550.0)
        .with_islands(vec![Island::circle(Vec2::new(250.0, -2000.0), 250.0, 12)])
        .context("invalid demo course")?;
    let wind_field = UniformWind(wind);
    let polar = PolarTable::j111();

    let mut agents: Vec<Agent> = (0..FLEET_SIZE)
        .map(|i| {
            let pos = Vec2::new(-500.0 + 200.0 * i as f32, 600.0 + 60.0 * (i % 2) as f32);
            let mut agent = Agent::new(i + 1, pos, 0.8);
            agent.speed = 2.0 * UNITS_PER_KNOT;
            agent
        })
        .collect();

    let mut fleet = Fleet::new(SEED, tuning);
    let mut phase = RacePhase::Prestart;
    let mut race_timer = COUNTDOWN;
    log::info!(
        "Regatta starting: {} agents, {:.0}s countdown, wind {:.0} kn",
        agents.len(),
        COUNTDOWN,
        wind.speed
    );

    loop {
        let commands = {
            let world = World {
                phase,
                race_timer,
                course: &course,
                wind,
                base_wind_speed: wind.speed,
                current: None,
                wind_field: &wind_field,
                performance: &polar,
                agents: &agents,
            };
            tick(&mut fleet, &world, SIM_DT)
        };

        for command in &commands {
            if let Some(agent) = agents.iter_mut().find(|a| a.id == command.agent_id) {
                let prev = agent.pos;
                helm(agent, command, &wind, &polar, SIM_DT);
                update_race(agent, prev, &course, phase, race_timer);
            }
        }

        match phase {
            RacePhase::Prestart => {
                race_timer -= SIM_DT;
                if race_timer <= 0.0 {
                    phase = RacePhase::Racing;
                    race_timer = 0.0;
                    let early = agents.iter().filter(|a| a.race.ocs).count();
                    log::info!("Start! {} agent(s) over the line early", early);
                }
            }
            RacePhase::Racing => race_timer += SIM_DT,
        }

        if agents.iter().all(|a| a.race.finished) {
            log::info!("All agents finished after {:.1}s", race_timer);
            break;
        }
        if phase == RacePhase::Racing && race_timer > TIME_LIMIT {
            log::warn!("Time limit reached with agents still racing");
            break;
        }
    }

    for agent in &agents {
        log::info!(
            "Agent {}: leg {} {}",
            agent.id,
            agent.race.leg,
            if agent.race.finished { "finished" } else { "DNF" }
        );
    }
    Ok(())
}

/// Turn-rate limited steering with a first-order speed response toward the polar
fn helm(agent: &mut Agent, command: &HelmCommand, wind: &WindSample, polar: &dyn PerformanceModel, dt: f32) {
    let max_turn = TURN_RATE * dt;
    let turn = normalize_angle(command.heading - agent.heading).clamp(-max_turn, max_turn);
    agent.heading = normalize_angle(agent.heading + turn);

    let twa = normalize_angle(agent.heading - wind.direction);
    agent.boom_side = Tack::from_heading(agent.heading, wind.direction).sign();
    agent.spinnaker = twa.abs() > 2.0;

    let target = polar.target_speed(twa.abs(), agent.spinnaker, wind.speed) * UNITS_PER_KNOT * command.speed_limit;
    agent.speed += (target - agent.speed) * (SPEED_RESPONSE * dt).min(1.0);
    agent.pos += heading_vector(agent.heading) * agent.speed * dt;
}

/// Leg bookkeeping: line crossings, zone flags, OCS and mark contact
fn update_race(agent: &mut Agent, prev: Vec2, course: &Course, phase: RacePhase, race_timer: f32) {
    if agent.race.finished {
        return;
    }

    agent.mark_contact = course
        .marks()
        .iter()
        .map(|m| m.pos - agent.pos)
        .find(|to_mark| to_mark.length() < MARK_CONTACT)
        .map(|to_mark| to_mark.normalize_or_zero());

    let leg = agent.race.leg;
    let (m1, m2) = course.gate_for_leg(leg);
    let along = m2 - m1;
    let normal = Vec2::new(along.y, -along.x);
    let before = (prev - m1).dot(normal);
    let after = (agent.pos - m1).dot(normal);
    // Rounding outside a gate mark still counts, within the zone
    let slack = course.zone_radius / along.length();
    let t = (agent.pos - m1).dot(along) / along.length_squared();
    let through = (-slack..=1.0 + slack).contains(&t);

    agent.race.in_zone = course.in_zone(agent.pos, leg);
    agent.race.is_rounding = agent.race.in_zone && course.is_rounding_leg(leg);

    if leg == 0 {
        match phase {
            RacePhase::Prestart => agent.race.ocs = after > 0.0,
            RacePhase::Racing if agent.race.ocs => {
                if after < 0.0 {
                    log::info!("Agent {} cleared its early start", agent.id);
                    agent.race.ocs = false;
                }
            }
            RacePhase::Racing => {
                if before <= 0.0 && after > 0.0 && through {
                    agent.race.leg = 1;
                    log::info!("Agent {} started at {:.1}s", agent.id, race_timer);
                }
            }
        }
        return;
    }

    let crossed = if Course::is_upwind_leg(leg) {
        before <= 0.0 && after > 0.0
    } else {
        before >= 0.0 && after < 0.0
    };
    if crossed && through {
        if leg >= course.total_legs {
            agent.race.finished = true;
            log::info!("Agent {} finished at {:.1}s", agent.id, race_timer);
        } else {
            agent.race.leg += 1;
            log::info!("Agent {} rounded onto leg {} at {:.1}s", agent.id, leg + 1, race_timer);
        }
    }
}
