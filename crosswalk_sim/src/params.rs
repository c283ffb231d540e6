// Tunable parameters for the crossing simulation.
//
// `SimParams::default()` is the scenario the simulation was tuned for. A
// JSON file can override any subset of fields; missing fields keep their
// defaults, so `{"reset_every": 0}` is a complete parameter file.
//
// Durations are in simulation steps except `step_delay`, which is the
// wall-clock pause between steps (seconds) used only by the `simulate`
// binary for pacing.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid simulation parameters: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Number of steps to run.
    pub steps: u64,

    // Light phases.
    pub green_steps: u32,
    pub amber_steps: u32,
    /// Nominal red duration. Red actually ends once `min_red_steps` have
    /// passed and the pedestrian has finished crossing.
    pub red_steps: u32,
    pub min_red_steps: u32,

    // Speeds, in world units per step.
    pub car_speed: f64,
    /// Fraction of `car_speed` used while the light is amber.
    pub amber_factor: f64,
    pub ped_speed: f64,

    /// Seconds between steps when streaming.
    pub step_delay: f64,

    /// Steps the car waits after a green light before moving off, once it
    /// has stopped at a red.
    pub reaction_delay_steps: u32,

    /// `z` at which the pedestrian counts as having crossed.
    pub ped_end_z: f64,

    /// Reset every agent every this many steps. 0 disables resets.
    pub reset_every: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            steps: 9999,
            green_steps: 6,
            amber_steps: 3,
            red_steps: 6,
            min_red_steps: 4,
            car_speed: 1.0,
            amber_factor: 0.5,
            ped_speed: 1.0,
            step_delay: 0.6,
            reaction_delay_steps: 1,
            ped_end_z: 6.0,
            reset_every: 60,
        }
    }
}

impl SimParams {
    pub fn from_json_str(json: &str) -> Result<Self, ParamsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ParamsError> {
        let json = std::fs::read_to_string(path).map_err(|source| ParamsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
