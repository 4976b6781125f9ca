//! Shared test scenes

use glam::Vec2;

use super::environment::{PolarTable, UniformWind};
use super::state::{Agent, AgentId, Course, RacePhase, WaterCurrent, WindSample, World};

/// Owns everything a `World` borrows
pub struct Scene {
    pub course: Course,
    pub wind: UniformWind,
    pub polar: PolarTable,
    pub agents: Vec<Agent>,
    pub phase: RacePhase,
    pub race_timer: f32,
    pub base_wind_speed: f32,
    pub current: Option<WaterCurrent>,
}

impl Scene {
    /// Wind from north at 12 kn over the standard course, racing
    pub fn new() -> Self {
        Self {
            course: Course::standard(0.0, 4000.0, 550.0),
            wind: UniformWind(WindSample {
                speed: 12.0,
                direction: 0.0,
            }),
            polar: PolarTable::j111(),
            agents: Vec::new(),
            phase: RacePhase::Racing,
            race_timer: 0.0,
            base_wind_speed: 12.0,
            current: None,
        }
    }

    pub fn with_wind_speed(mut self, speed: f32) -> Self {
        self.wind.0.speed = speed;
        self.base_wind_speed = speed;
        self
    }

    pub fn add(&mut self, id: AgentId, pos: Vec2, heading: f32, speed: f32) -> &mut Agent {
        let mut agent = Agent::new(id, pos, heading);
        agent.speed = speed;
        agent.race.leg = 1;
        self.agents.push(agent);
        self.agents.last_mut().unwrap()
    }

    pub fn agent_mut(&mut self, id: AgentId) -> &mut Agent {
        self.agents.iter_mut().find(|a| a.id == id).unwrap()
    }

    pub fn world(&self) -> World<'_> {
        World {
            phase: self.phase,
            race_timer: self.race_timer,
            course: &self.course,
            wind: self.wind.0,
            base_wind_speed: self.base_wind_speed,
            current: self.current,
            wind_field: &self.wind,
            performance: &self.polar,
            agents: &self.agents,
        }
    }
}
