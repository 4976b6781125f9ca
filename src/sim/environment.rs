//! External collaborators: wind field and boat performance
//!
//! The decision core only consumes these through traits. `UniformWind` and
//! `PolarTable` are simple stand-ins for tests and the headless demo.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::WindSample;

/// Wind sampled anywhere on the course
pub trait WindField {
    fn wind_at(&self, pos: Vec2) -> WindSample;
}

/// Target boat speed lookup
pub trait PerformanceModel {
    /// Target speed in knots for a true wind angle (radians, sign ignored)
    fn target_speed(&self, twa: f32, spinnaker: bool, wind_speed: f32) -> f32;
}

/// Same wind everywhere
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformWind(pub WindSample);

impl WindField for UniformWind {
    fn wind_at(&self, _pos: Vec2) -> WindSample {
        self.0
    }
}

/// Polar speeds for one true wind speed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarRow {
    /// True wind speed (knots)
    pub wind: f32,
    pub spinnaker: Vec<f32>,
    pub non_spinnaker: Vec<f32>,
}

/// Polar table, bilinear in true wind angle and true wind speed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarTable {
    /// True wind angles in degrees, ascending
    pub angles: Vec<f32>,
    /// Rows sorted by ascending wind speed
    pub rows: Vec<PolarRow>,
}

impl PolarTable {
    /// J/111 sportboat polar
    pub fn j111() -> Self {
        let row = |wind: f32, spinnaker: [f32; 13], non_spinnaker: [f32; 13]| PolarRow {
            wind,
            spinnaker: spinnaker.to_vec(),
            non_spinnaker: non_spinnaker.to_vec(),
        };
        Self {
            angles: vec![
                0.0, 30.0, 38.0, 45.0, 52.0, 60.0, 75.0, 90.0, 110.0, 120.0, 135.0, 150.0, 180.0,
            ],
            rows: vec![
                row(
                    6.0,
                    [0.0, 0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 5.46, 5.5, 5.48, 5.25, 4.72, 4.01],
                    [0.0, 0.0, 4.7, 4.93, 5.18, 5.29, 5.36, 5.46, 4.94, 4.65, 4.08, 3.51, 3.01],
                ),
                row(
                    8.0,
                    [0.0, 0.0, 0.6, 1.2, 1.8, 2.4, 3.5, 6.79, 6.87, 6.85, 6.58, 5.94, 5.06],
                    [0.0, 0.0, 5.8, 6.09, 6.41, 6.55, 6.65, 6.79, 6.17, 5.82, 5.12, 4.42, 3.8],
                ),
                row(
                    10.0,
                    [0.0, 0.0, 0.7, 1.4, 2.1, 2.8, 4.0, 7.89, 8.01, 8.01, 7.72, 6.99, 6.0],
                    [0.0, 0.0, 6.66, 7.0, 7.38, 7.56, 7.7, 7.89, 7.2, 6.8, 6.0, 5.2, 4.5],
                ),
                row(
                    12.0,
                    [0.0, 0.0, 0.8, 1.6, 2.4, 3.2, 4.5, 8.6, 8.74, 8.75, 8.44, 7.65, 6.58],
                    [0.0, 0.0, 7.23, 7.6, 8.02, 8.22, 8.38, 8.6, 7.85, 7.42, 6.56, 5.69, 4.93],
                ),
                row(
                    14.0,
                    [0.0, 0.0, 0.9, 1.8, 2.7, 3.6, 5.0, 9.01, 9.18, 9.2, 8.89, 8.08, 6.98],
                    [0.0, 0.0, 7.52, 7.91, 8.36, 8.57, 8.76, 9.01, 8.25, 7.81, 6.91, 6.01, 5.23],
                ),
                row(
                    16.0,
                    [0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.5, 9.42, 9.66, 9.7, 9.42, 8.59, 7.47],
                    [0.0, 0.0, 7.76, 8.18, 8.66, 8.9, 9.13, 9.42, 8.68, 8.24, 7.32, 6.39, 5.61],
                ),
                row(
                    20.0,
                    [0.0, 0.0, 1.2, 2.4, 3.6, 4.8, 6.5, 10.43, 10.87, 11.01, 10.81, 9.98, 8.88],
                    [0.0, 0.0, 8.2, 8.7, 9.26, 9.6, 9.98, 10.43, 9.77, 9.35, 8.4, 7.42, 6.66],
                ),
            ],
        }
    }

    /// Speed along one row, interpolated in angle
    fn row_speed(&self, row: &PolarRow, spinnaker: bool, twa_deg: f32) -> f32 {
        let speeds = if spinnaker { &row.spinnaker } else { &row.non_spinnaker };
        for (i, pair) in self.angles.windows(2).enumerate() {
            if twa_deg >= pair[0] && twa_deg <= pair[1] {
                let t = (twa_deg - pair[0]) / (pair[1] - pair[0]);
                return speeds[i] + (speeds[i + 1] - speeds[i]) * t;
            }
        }
        speeds.last().copied().unwrap_or(0.0)
    }
}

impl Default for PolarTable {
    fn default() -> Self {
        Self::j111()
    }
}

impl PerformanceModel for PolarTable {
    fn target_speed(&self, twa: f32, spinnaker: bool, wind_speed: f32) -> f32 {
        let twa_deg = twa.abs().to_degrees().min(180.0);
        let (Some(first), Some(last)) = (self.rows.first(), self.rows.last()) else {
            return 0.0;
        };

        // Below the lowest row, ramp linearly up from a flat calm
        if wind_speed <= first.wind {
            let t = (wind_speed / first.wind).clamp(0.0, 1.0);
            return self.row_speed(first, spinnaker, twa_deg) * t;
        }
        if wind_speed >= last.wind {
            return self.row_speed(last, spinnaker, twa_deg);
        }

        for pair in self.rows.windows(2) {
            let (lo, hi) = (&pair[0], &pair[1]);
            if wind_speed >= lo.wind && wind_speed <= hi.wind {
                let t = (wind_speed - lo.wind) / (hi.wind - lo.wind);
                let s1 = self.row_speed(lo, spinnaker, twa_deg);
                let s2 = self.row_speed(hi, spinnaker, twa_deg);
                return s1 + (s2 - s1) * t;
            }
        }
        self.row_speed(last, spinnaker, twa_deg)
    }
}
