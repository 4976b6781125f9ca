//! Fleet decision tick
//!
//! Drives every agent's controller for one simulated step. Controllers are
//! kept sorted by agent ID and each is seeded from the fleet seed and its ID,
//! so the same seed and inputs always produce the same commands.

use serde::{Deserialize, Serialize};

use super::controller::{Controller, HelmCommand};
use super::state::{AgentId, World};
use crate::settings::Tuning;

/// RNG seed bookkeeping for reproducible runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Independent stream for one agent
    pub fn agent_seed(&self, id: AgentId) -> u64 {
        self.seed ^ u64::from(id).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

/// Controllers for every agent in the race
#[derive(Debug, Clone)]
pub struct Fleet {
    rng_state: RngState,
    tuning: Tuning,
    /// Sorted by agent ID
    controllers: Vec<Controller>,
}

impl Fleet {
    pub fn new(seed: u64, tuning: Tuning) -> Self {
        Self {
            rng_state: RngState::new(seed),
            tuning,
            controllers: Vec::new(),
        }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn controller(&self, id: AgentId) -> Option<&Controller> {
        self.controllers
            .binary_search_by_key(&id, Controller::id)
            .ok()
            .map(|i| &self.controllers[i])
    }

    /// Add controllers for new agents and drop those that left the snapshot
    fn sync(&mut self, world: &World) {
        self.controllers.retain(|c| world.agent(c.id()).is_some());
        for agent in world.agents {
            if let Err(index) = self.controllers.binary_search_by_key(&agent.id, Controller::id) {
                log::debug!("Agent {} joined the fleet", agent.id);
                let seed = self.rng_state.agent_seed(agent.id);
                self.controllers
                    .insert(index, Controller::new(agent.id, seed, &self.tuning));
            }
        }
    }
}

/// Advance every controller by one step, commands in agent ID order
pub fn tick(fleet: &mut Fleet, world: &World, dt: f32) -> Vec<HelmCommand> {
    fleet.sync(world);
    let tuning = &fleet.tuning;
    fleet
        .controllers
        .iter_mut()
        .map(|controller| controller.update(world, tuning, dt))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::heading_vector;
    use crate::sim::fixtures::Scene;
    use glam::Vec2;

    /// Crude helm response: turn straight onto the heading, hold a fixed speed
    fn advance(scene: &mut Scene, commands: &[HelmCommand], dt: f32) {
        for command in commands {
            let agent = scene.agent_mut(command.agent_id);
            agent.heading = command.heading;
            agent.speed = 80.0 * command.speed_limit;
            agent.pos += heading_vector(agent.heading) * agent.speed * dt;
        }
    }

    fn scene() -> Scene {
        let mut scene = Scene::new();
        scene.add(3, Vec2::new(600.0, -1500.0), 0.2, 60.0);
        scene.add(1, Vec2::new(-600.0, -1200.0), -0.4, 60.0);
        scene.add(2, Vec2::new(0.0, -1350.0), 0.6, 60.0);
        scene
    }

    #[test]
    fn test_commands_in_id_order() {
        let scene = scene();
        let mut fleet = Fleet::new(1, Tuning::default());
        let commands = tick(&mut fleet, &scene.world(), SIM_DT);
        let ids: Vec<AgentId> = commands.iter().map(|c| c.agent_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(fleet.len(), 3);
    }

    #[test]
    fn test_fleet_follows_snapshot() {
        let mut scene = scene();
        let mut fleet = Fleet::new(1, Tuning::default());
        tick(&mut fleet, &scene.world(), SIM_DT);

        scene.agents.retain(|a| a.id != 2);
        scene.add(7, Vec2::new(0.0, -1000.0), 0.0, 60.0);
        let commands = tick(&mut fleet, &scene.world(), SIM_DT);
        let ids: Vec<AgentId> = commands.iter().map(|c| c.agent_id).collect();
        assert_eq!(ids, vec![1, 3, 7]);
        assert!(fleet.controller(2).is_none());
        assert!(fleet.controller(7).is_some());
    }

    #[test]
    fn test_agents_get_distinct_streams() {
        let fleet = Fleet::new(99, Tuning::default());
        let seeds: Vec<u64> = (1..=3).map(|id| fleet.rng_state.agent_seed(id)).collect();
        assert_ne!(seeds[0], seeds[1]);
        assert_ne!(seeds[1], seeds[2]);
    }

    #[test]
    fn test_determinism() {
        // Two fleets with the same seed should produce identical races
        let mut scene1 = scene();
        let mut scene2 = scene();
        let mut fleet1 = Fleet::new(12345, Tuning::default());
        let mut fleet2 = Fleet::new(12345, Tuning::default());

        for _ in 0..300 {
            let commands1 = tick(&mut fleet1, &scene1.world(), SIM_DT);
            let commands2 = tick(&mut fleet2, &scene2.world(), SIM_DT);
            assert_eq!(commands1, commands2);
            advance(&mut scene1, &commands1, SIM_DT);
            advance(&mut scene2, &commands2, SIM_DT);
        }

        for (a, b) in scene1.agents.iter().zip(&scene2.agents) {
            assert!((a.pos - b.pos).length() < 0.0001);
        }
    }

    #[test]
    fn test_fleet_makes_progress_upwind() {
        let mut scene = scene();
        let mut fleet = Fleet::new(5, Tuning::default());
        let start: Vec<f32> = scene.agents.iter().map(|a| a.pos.y).collect();

        // Ten simulated seconds
        for _ in 0..600 {
            let commands = tick(&mut fleet, &scene.world(), SIM_DT);
            advance(&mut scene, &commands, SIM_DT);
        }
        for (agent, y0) in scene.agents.iter().zip(start) {
            assert!(agent.pos.y < y0, "agent {} lost ground", agent.id);
        }
    }
}
