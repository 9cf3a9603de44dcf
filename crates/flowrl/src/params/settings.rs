//! Simulation, environment, network and placement parameters.

use super::controllers::ensure_finite;
use crate::encoding::to_json_value;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form tunables interpreted by the environment or scenario.
pub type AdditionalParams = BTreeMap<String, Value>;

/// Simulation backend parameters. Opaque to this crate; forwarded to the kernel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SumoParams {
    /// Seconds per simulation step
    pub sim_step: f64,
    /// Backend binary ("sumo" headless, "sumo-gui" rendered)
    pub sumo_binary: String,
    /// Port used to connect to the backend (chosen by the backend if unset)
    pub port: Option<u16>,
    /// Directory for emission output
    pub emission_path: Option<String>,
    /// Sub-lane resolution; unset disables the sub-lane model
    pub lateral_resolution: Option<f64>,
    /// Suppress per-step log output
    pub no_step_log: bool,
    /// Ballistic position updates instead of Euler
    pub ballistic: bool,
    pub overtake_right: bool,
    pub seed: Option<u64>,
    /// Restart the backend on every reset
    pub restart_instance: bool,
    pub print_warnings: bool,
    /// Seconds before a stuck vehicle is teleported (-1 disables)
    pub teleport_time: i64,
}

impl Default for SumoParams {
    fn default() -> Self {
        Self {
            sim_step: 0.1,
            sumo_binary: "sumo".to_string(),
            port: None,
            emission_path: None,
            lateral_resolution: None,
            no_step_log: true,
            ballistic: false,
            overtake_right: false,
            seed: None,
            restart_instance: false,
            print_warnings: true,
            teleport_time: -1,
        }
    }
}

impl SumoParams {
    /// Set the simulation step size
    pub fn with_sim_step(mut self, sim_step: f64) -> Self {
        self.sim_step = sim_step;
        self
    }

    /// Set the backend binary
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.sumo_binary = binary.into();
        self
    }

    /// Set the backend seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn check_finite(&self) -> Result<()> {
        ensure_finite("sumo.sim_step", self.sim_step)?;
        if let Some(res) = self.lateral_resolution {
            ensure_finite("sumo.lateral_resolution", res)?;
        }
        Ok(())
    }
}

/// Environment parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvParams {
    /// Steps per rollout
    pub horizon: u64,
    /// Steps run without agent actions after each reset
    pub warmup_steps: u64,
    /// Simulation steps per environment step
    pub sims_per_step: u32,
    pub vehicle_arrangement_shuffle: bool,
    pub starting_position_shuffle: bool,
    pub sort_vehicles: bool,
    /// Evaluation mode: environments report raw rather than shaped rewards
    pub evaluate: bool,
    pub additional_params: AdditionalParams,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self {
            horizon: 500,
            warmup_steps: 0,
            sims_per_step: 1,
            vehicle_arrangement_shuffle: false,
            starting_position_shuffle: false,
            sort_vehicles: false,
            evaluate: false,
            additional_params: AdditionalParams::new(),
        }
    }
}

impl EnvParams {
    pub fn new(horizon: u64) -> Self {
        Self {
            horizon,
            ..Default::default()
        }
    }

    pub fn with_warmup_steps(mut self, steps: u64) -> Self {
        self.warmup_steps = steps;
        self
    }

    pub fn with_sims_per_step(mut self, sims: u32) -> Self {
        self.sims_per_step = sims;
        self
    }

    /// Add an environment-specific tunable. Non-finite floats are rejected
    /// since JSON would store them as `null`.
    pub fn with_param<T: Serialize>(mut self, key: &str, value: T) -> Result<Self> {
        let value = to_json_value(&format!("env.additional_params.{}", key), &value)?;
        self.additional_params.insert(key.to_string(), value);
        Ok(self)
    }

    /// Numeric tunable by key
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.additional_params.get(key).and_then(Value::as_f64)
    }
}

/// Network geometry parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetParams {
    pub no_internal_links: bool,
    /// Path to an OpenStreetMap file, for imported networks
    pub osm_path: Option<String>,
    /// Path to a prebuilt network file
    pub netfile: Option<String>,
    pub additional_params: AdditionalParams,
}

impl Default for NetParams {
    fn default() -> Self {
        Self {
            no_internal_links: true,
            osm_path: None,
            netfile: None,
            additional_params: AdditionalParams::new(),
        }
    }
}

impl NetParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a geometry tunable
    pub fn with_param<T: Serialize>(mut self, key: &str, value: T) -> Result<Self> {
        let value = to_json_value(&format!("net.additional_params.{}", key), &value)?;
        self.additional_params.insert(key.to_string(), value);
        Ok(self)
    }
}

/// How vehicles are spread along the network on reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    #[default]
    Uniform,
    Random,
    Custom,
}

/// Vehicle placement and reset policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitialConfig {
    pub shuffle: bool,
    pub spacing: Spacing,
    /// Minimum gap between vehicles at placement (m)
    pub min_gap: f64,
    /// Std. deviation of the position perturbation (m)
    pub perturbation: f64,
    /// Position of the first vehicle (m)
    pub x0: f64,
    /// Length of the network left empty at placement (m)
    pub bunching: f64,
    /// Number of lanes used for placement; `None` uses all lanes
    pub lanes_distribution: Option<u32>,
    pub edges_distribution: String,
    pub additional_params: AdditionalParams,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            spacing: Spacing::Uniform,
            min_gap: 0.0,
            perturbation: 0.0,
            x0: 0.0,
            bunching: 0.0,
            lanes_distribution: None,
            edges_distribution: "all".to_string(),
            additional_params: AdditionalParams::new(),
        }
    }
}

impl InitialConfig {
    pub(crate) fn check_finite(&self) -> Result<()> {
        ensure_finite("initial.min_gap", self.min_gap)?;
        ensure_finite("initial.perturbation", self.perturbation)?;
        ensure_finite("initial.x0", self.x0)?;
        ensure_finite("initial.bunching", self.bunching)
    }
}
