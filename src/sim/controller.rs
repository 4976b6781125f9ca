//! Per-agent decision controller
//!
//! Runs the layers in order once per decision interval: risk, liveness,
//! navigation and strategy (or the start sequence), avoidance, then the
//! watchdog's escape overrides. Between decisions the last command is reused.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::avoidance::{self, AvoidanceContext};
use super::navigation::{Navigator, StartCommand, StartPlan, start_command};
use super::risk::RiskAssessor;
use super::state::{Agent, AgentId, World};
use super::strategy::TackPlanner;
use super::watchdog::Watchdog;
use crate::consts::DECISION_INTERVAL;
use crate::normalize_angle;
use crate::settings::Tuning;

/// Output of one decision: what the helm should do
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelmCommand {
    pub agent_id: AgentId,
    /// Desired heading, normalized
    pub heading: f32,
    /// Fraction of achievable speed, 0..=1
    pub speed_limit: f32,
}

/// Everything one agent remembers between decisions
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub watchdog: Watchdog,
    pub risk: RiskAssessor,
    pub tack: TackPlanner,
    pub navigator: Navigator,
    pub start: StartPlan,
}

/// Decision core for a single agent
#[derive(Debug, Clone)]
pub struct Controller {
    id: AgentId,
    rng: Pcg32,
    /// Time until the next decision
    update_timer: f32,
    /// Time since the last decision
    elapsed: f32,
    command: Option<HelmCommand>,
    state: ControllerState,
}

impl Controller {
    pub fn new(id: AgentId, seed: u64, tuning: &Tuning) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let start = StartPlan::random(&mut rng, &tuning.navigation);
        // Staggered so a fleet does not recompute on the same tick
        let update_timer = DECISION_INTERVAL + rng.random_range(0.0..DECISION_INTERVAL);
        Self {
            id,
            rng,
            update_timer,
            elapsed: 0.0,
            command: None,
            state: ControllerState {
                watchdog: Watchdog::new(),
                risk: RiskAssessor::new(),
                tack: TackPlanner::new(),
                navigator: Navigator::new(&tuning.planner),
                start,
            },
        }
    }

    #[inline]
    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn last_command(&self) -> Option<HelmCommand> {
        self.command
    }

    /// Advance by `dt` and return the current command
    ///
    /// Recomputes when the decision timer expires (or nothing has been decided
    /// yet), using the time accumulated since the previous decision as its step.
    pub fn update(&mut self, world: &World, tuning: &Tuning, dt: f32) -> HelmCommand {
        self.elapsed += dt;
        self.update_timer -= dt;

        let idle = HelmCommand {
            agent_id: self.id,
            heading: 0.0,
            speed_limit: 0.0,
        };
        if let Some(command) = self.command.filter(|_| self.update_timer > 0.0) {
            return command;
        }
        let Some(agent) = world.agent(self.id) else {
            return self.command.unwrap_or(idle);
        };

        if self.update_timer <= 0.0 {
            self.update_timer = DECISION_INTERVAL;
        }
        let step = std::mem::take(&mut self.elapsed);
        let command = self.decide(agent, world, tuning, step);
        self.command = Some(command);
        command
    }

    fn decide(&mut self, agent: &Agent, world: &World, tuning: &Tuning, dt: f32) -> HelmCommand {
        let state = &mut self.state;
        state.risk.update(agent, world, dt, &tuning.risk);
        state.watchdog.update_liveness(agent, world, dt, &tuning.liveness);
        state.tack.tick(dt);
        let liveness = state.watchdog.state();

        let mut speed_limit = 1.0;
        let desired = match state.watchdog.steer(agent, world, dt, &mut self.rng, &tuning.liveness) {
            Some(heading) => heading,
            None if !world.is_racing() => match start_command(agent, world, &state.start, &tuning.navigation) {
                StartCommand::Steer { heading, speed } => {
                    speed_limit = speed;
                    heading
                }
                StartCommand::Target { point, speed } => {
                    speed_limit = speed;
                    state.tack.heading(agent, point, world, liveness, &tuning.strategy)
                }
            },
            None => {
                let target = state.navigator.target(
                    agent,
                    world,
                    liveness,
                    &state.start,
                    dt,
                    &mut self.rng,
                    &tuning.navigation,
                    &tuning.planner,
                );
                state.tack.heading(agent, target, world, liveness, &tuning.strategy)
            }
        };

        let mut heading = if state.watchdog.is_wiggling() {
            speed_limit = 1.0;
            desired
        } else {
            let ctx = AvoidanceContext {
                agent,
                world,
                liveness,
                severity: state.risk.severity(),
                role: state.risk.role(),
            };
            avoidance::select(&ctx, desired, &tuning.avoidance)
        };

        if let Some(escape) = state.watchdog.mark_escape(agent, dt, &tuning.liveness) {
            heading = escape;
            speed_limit = 1.0;
        }

        HelmCommand {
            agent_id: self.id,
            heading: normalize_angle(heading),
            speed_limit: speed_limit.clamp(0.0, 1.0),
        }
    }
}
