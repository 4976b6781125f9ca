//! Controller tuning
//!
//! Every threshold the decision core uses lives here so races can be
//! re-balanced from a JSON file without recompiling. Missing fields fall back
//! to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Liveness watchdog thresholds (seconds and knots)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessTuning {
    /// Below this speed the agent counts as stuck
    pub stuck_speed_knots: f32,
    /// Above this speed the stuck timer resets (hysteresis band)
    pub recovered_speed_knots: f32,
    /// Start leg: elapsed race time before recovery
    pub start_recovery_elapsed: f32,
    /// Start leg: stuck time before recovery
    pub start_recovery_stuck: f32,
    /// Start leg: elapsed race time before force
    pub start_force_elapsed: f32,
    /// Start leg: stuck time before force
    pub start_force_stuck: f32,
    /// Later legs: stuck time before recovery
    pub stall_recovery_stuck: f32,
    /// Later legs: stuck time before force
    pub stall_force_stuck: f32,
    /// Stuck time before a wiggle starts
    pub wiggle_trigger: f32,
    /// Wiggle hold duration
    pub wiggle_duration: f32,
    /// Wiggle heading offset from the wind (radians)
    pub wiggle_wind_offset: f32,
    /// Obstacles closer than this pick the wiggle side
    pub wiggle_obstacle_radius: f32,
    /// Past this stuck time the wiggle side is random
    pub wiggle_random_after: f32,
    /// A wiggle that ends with more stuck time than this failed
    pub wiggle_retry_stuck: f32,
    /// Clearance hold after a successful wiggle
    pub clearance_duration: f32,
    /// Mark contact only latches below this speed
    pub mark_escape_speed_knots: f32,
    /// Mark escape hold duration
    pub mark_escape_duration: f32,
}

impl Default for LivenessTuning {
    fn default() -> Self {
        Self {
            stuck_speed_knots: 1.0,
            recovered_speed_knots: 2.5,
            start_recovery_elapsed: 15.0,
            start_recovery_stuck: 5.0,
            start_force_elapsed: 45.0,
            start_force_stuck: 10.0,
            stall_recovery_stuck: 15.0,
            stall_force_stuck: 30.0,
            wiggle_trigger: 3.0,
            wiggle_duration: 5.0,
            wiggle_wind_offset: 1.75,
            wiggle_obstacle_radius: 100.0,
            wiggle_random_after: 8.0,
            wiggle_retry_stuck: 5.0,
            clearance_duration: 3.0,
            mark_escape_speed_knots: 2.0,
            mark_escape_duration: 2.0,
        }
    }
}

/// Collision risk classification thresholds (world units and seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskTuning {
    pub detection_radius: f32,
    pub medium_cpa: f32,
    pub medium_tcpa: f32,
    pub high_cpa: f32,
    pub high_tcpa: f32,
    pub imminent_distance: f32,
    pub imminent_cpa: f32,
    pub imminent_tcpa: f32,
    /// How long a non-low severity is held
    pub commit_duration: f32,
}

impl Default for RiskTuning {
    fn default() -> Self {
        Self {
            detection_radius: 600.0,
            medium_cpa: 70.0,
            medium_tcpa: 8.0,
            high_cpa: 50.0,
            high_tcpa: 4.5,
            imminent_distance: 60.0,
            imminent_cpa: 35.0,
            imminent_tcpa: 2.0,
            commit_duration: 2.0,
        }
    }
}

/// Cost surcharges applied per liveness level
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LivenessCosts {
    pub normal: f32,
    pub recovery: f32,
    pub force: f32,
}

/// Reactive avoidance cost field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceTuning {
    /// Heading offsets searched around the desired heading (radians)
    pub offsets: Vec<f32>,
    pub lookahead: f32,
    pub samples: u32,
    /// Minimum projection speed (units/s)
    pub speed_floor: f32,
    pub deviation_weight: f32,
    pub deviation_exponent: f32,
    /// Extra deviation cost when standing on
    pub stand_on_weight: f32,

    pub safe_distance: f32,
    pub safe_distance_start: f32,
    pub safe_distance_recovery: f32,
    pub safe_distance_force: f32,
    pub give_way_bubble: f32,
    pub proximity_radius: f32,
    pub collision_weight: f32,
    pub proximity_weight: f32,
    pub imminent_surcharge: f32,

    pub mark_hard_radius: f32,
    pub mark_soft_radius: f32,
    pub mark_hard_weight: f32,
    pub mark_soft_weight: f32,

    pub boundary_hard_margin: f32,
    pub boundary_soft_margin: f32,
    pub boundary_soft_weight: f32,

    pub island_check_margin: f32,
    pub island_soft_margin: f32,
    pub island_hit_cost: f32,
    pub island_soft_weight: f32,

    pub cross_bow_radius: f32,
    pub cross_bow_penalty: f32,
    pub duck_stern_bonus: f32,

    pub boat_collision: LivenessCosts,
    pub static_collision: LivenessCosts,
    pub rule_violation: LivenessCosts,
}

impl Default for AvoidanceTuning {
    fn default() -> Self {
        Self {
            offsets: vec![
                0.0, 0.1, -0.1, 0.2, -0.2, 0.4, -0.4, 0.6, -0.6, 0.8, -0.8, 1.2, -1.2, 1.6, -1.6,
            ],
            lookahead: 4.0,
            samples: 5,
            speed_floor: 2.0,
            deviation_weight: 10.0,
            deviation_exponent: 1.5,
            stand_on_weight: 2000.0,

            safe_distance: 80.0,
            safe_distance_start: 60.0,
            safe_distance_recovery: 50.0,
            safe_distance_force: 20.0,
            give_way_bubble: 150.0,
            proximity_radius: 250.0,
            collision_weight: 500_000.0,
            proximity_weight: 5000.0,
            imminent_surcharge: 20_000.0,

            mark_hard_radius: 50.0,
            mark_soft_radius: 130.0,
            mark_hard_weight: 200_000.0,
            mark_soft_weight: 25_000.0,

            boundary_hard_margin: 80.0,
            boundary_soft_margin: 120.0,
            boundary_soft_weight: 5000.0,

            island_check_margin: 30.0,
            island_soft_margin: 80.0,
            island_hit_cost: 500_000.0,
            island_soft_weight: 10_000.0,

            cross_bow_radius: 250.0,
            cross_bow_penalty: 1500.0,
            duck_stern_bonus: 500.0,

            boat_collision: LivenessCosts {
                normal: 10_000.0,
                recovery: 2000.0,
                force: 500.0,
            },
            static_collision: LivenessCosts {
                normal: 15_000.0,
                recovery: 8000.0,
                force: 500.0,
            },
            // Force ignores right of way so a deadlocked agent can escape
            rule_violation: LivenessCosts {
                normal: 20_000.0,
                recovery: 1000.0,
                force: 0.0,
            },
        }
    }
}

/// Global route planner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerTuning {
    /// Radial inflation of island polygons
    pub safety_margin: f32,
    pub max_expansions: usize,
    pub replan_interval: f32,
    pub replan_jitter: f32,
    /// Replan when the final target moves further than this
    pub target_moved: f32,
    pub arrival_radius: f32,
}

impl Default for PlannerTuning {
    fn default() -> Self {
        Self {
            safety_margin: 100.0,
            max_expansions: 2000,
            replan_interval: 2.0,
            replan_jitter: 1.0,
            target_moved: 50.0,
            arrival_radius: 60.0,
        }
    }
}

/// Navigation target selection (world units)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationTuning {
    pub ocs_retreat: f32,
    pub ocs_retreat_escalated: f32,
    pub line_excursion: f32,
    pub line_excursion_force: f32,
    pub missed_gate_tolerance: f32,
    pub missed_gate_snap: f32,
    pub rounding_offset: f32,
    pub finished_excursion: f32,
    pub start_pct_min: f32,
    pub start_pct_max: f32,
    pub start_distance_min: f32,
    pub start_distance_max: f32,
    /// Approach speed assumed while hovering (units/s)
    pub hover_approach_speed: f32,
    pub hover_buffer: f32,
    /// Below this countdown the hover phase always ends
    pub hover_min_countdown: f32,
    /// Close enough to the setup point to start luffing
    pub setup_tolerance: f32,
    /// Speed assumed for the final run to the line (units/s)
    pub final_approach_speed: f32,
    pub hover_speed: f32,
    pub kill_speed: f32,
    /// Arriving this much before the gun counts as early
    pub early_margin: f32,
    pub ocs_recover_distance: f32,
}

impl Default for NavigationTuning {
    fn default() -> Self {
        Self {
            ocs_retreat: 150.0,
            ocs_retreat_escalated: 250.0,
            line_excursion: 150.0,
            line_excursion_force: 300.0,
            missed_gate_tolerance: 50.0,
            missed_gate_snap: 150.0,
            rounding_offset: 90.0,
            finished_excursion: 500.0,
            start_pct_min: 0.1,
            start_pct_max: 0.9,
            start_distance_min: 100.0,
            start_distance_max: 300.0,
            hover_approach_speed: 30.0,
            hover_buffer: 10.0,
            hover_min_countdown: 10.0,
            setup_tolerance: 20.0,
            final_approach_speed: 100.0,
            hover_speed: 0.2,
            kill_speed: 0.1,
            early_margin: 2.0,
            ocs_recover_distance: 100.0,
        }
    }
}

/// Strategic heading planner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyTuning {
    /// |TWA| below this is the upwind zone
    pub upwind_zone: f32,
    /// |TWA| above this is the downwind zone
    pub downwind_zone: f32,
    pub upwind_optimal: f32,
    pub downwind_optimal: f32,
    pub downwind_optimal_planing: f32,
    /// True wind speed that enables the planing angle (knots)
    pub planing_wind: f32,
    pub fallback_direct_twa: f32,
    pub fallback_wind_offset: f32,
    /// Largest |sin| of the crab correction that is still solved
    pub crab_ratio_limit: f32,
    /// Boat speed assumed by the crab solve when slower (units/s)
    pub crab_speed_floor: f32,
    /// Boat speed assumed by the layline check when slower (units/s)
    pub layline_speed_floor: f32,
    /// Current slower than this is ignored (knots)
    pub current_threshold: f32,
    pub ramp_steps: u32,
    pub ramp_alpha: f32,
    pub tack_hysteresis: f32,
    pub pressure_weight: f32,
    pub layline_tolerance: f32,
    pub layline_cooldown: f32,
    pub switch_cooldown: f32,
}

impl Default for StrategyTuning {
    fn default() -> Self {
        use std::f32::consts::PI;
        Self {
            upwind_zone: PI / 3.5,
            downwind_zone: PI * 0.7,
            upwind_optimal: 45f32.to_radians(),
            downwind_optimal: 150f32.to_radians(),
            downwind_optimal_planing: 140f32.to_radians(),
            planing_wind: 12.0,
            fallback_direct_twa: 0.7,
            fallback_wind_offset: 0.75,
            crab_ratio_limit: 0.9,
            crab_speed_floor: 30.0,
            layline_speed_floor: 60.0,
            current_threshold: 0.1,
            ramp_steps: 5,
            ramp_alpha: 0.086,
            tack_hysteresis: 0.4,
            pressure_weight: 0.8,
            layline_tolerance: 0.05,
            layline_cooldown: 10.0,
            switch_cooldown: 5.0,
        }
    }
}

/// Complete controller tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub liveness: LivenessTuning,
    pub risk: RiskTuning,
    pub avoidance: AvoidanceTuning,
    pub planner: PlannerTuning,
    pub navigation: NavigationTuning,
    pub strategy: StrategyTuning,
}

impl Tuning {
    /// Parse tuning from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load tuning from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let tuning = Self::from_json(&json)?;
        log::info!("Loaded tuning from {}", path.as_ref().display());
        Ok(tuning)
    }

    /// Serialize tuning as pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would break the search or the timers
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, f32); 5] = [
            ("avoidance.lookahead", self.avoidance.lookahead),
            ("avoidance.samples", self.avoidance.samples as f32),
            ("planner.max_expansions", self.planner.max_expansions as f32),
            ("planner.arrival_radius", self.planner.arrival_radius),
            ("risk.commit_duration", self.risk.commit_duration),
        ];
        for (field, value) in checks {
            if !(value > 0.0) {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        if self.avoidance.offsets.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "avoidance.offsets",
                value: 0.0,
            });
        }
        let ranges: [(&'static str, f32, f32); 2] = [
            (
                "navigation.start_pct_min",
                self.navigation.start_pct_min,
                self.navigation.start_pct_max,
            ),
            (
                "navigation.start_distance_min",
                self.navigation.start_distance_min,
                self.navigation.start_distance_max,
            ),
        ];
        for (field, min, max) in ranges {
            // Equal bounds are allowed and pin the value
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(ConfigError::InvalidValue { field, value: min });
            }
        }
        Ok(())
    }
}
