//! PPO trainer configuration handed to the external runner.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key under `env_config` holding the serialized flow parameters.
pub const FLOW_PARAMS_KEY: &str = "flow_params";

/// Largest SGD minibatch the trainer accepts.
pub const MAX_SGD_BATCH_SIZE: u64 = 16384;

/// Fully connected policy network settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Hidden layer widths
    pub fcnet_hiddens: Vec<usize>,
    /// Learn the action log-std as a free variable
    pub free_log_std: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            fcnet_hiddens: vec![256, 256],
            free_log_std: false,
        }
    }
}

/// Configuration for the PPO trainer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpoConfig {
    // Rollouts
    /// Number of rollout workers
    pub num_workers: u32,
    /// Environment steps collected per training iteration
    pub timesteps_per_batch: u64,
    /// Episode length cap; `None` defers to the environment
    pub horizon: Option<u64>,

    // PPO hyperparameters
    /// Discount factor
    pub gamma: f64,
    /// GAE lambda
    #[serde(rename = "lambda")]
    pub gae_lambda: f64,
    pub use_gae: bool,
    /// Initial KL penalty coefficient
    pub kl_coeff: f64,
    /// Target KL divergence
    pub kl_target: f64,
    /// PPO clipping parameter
    pub clip_param: f64,
    pub entropy_coeff: f64,

    // Optimization
    /// SGD passes per batch
    pub num_sgd_iter: u32,
    /// Learning rate
    pub sgd_stepsize: f64,
    /// Minibatch size
    pub sgd_batchsize: u64,

    pub model: ModelConfig,
    pub observation_filter: String,

    /// Passed to every environment instance
    pub env_config: BTreeMap<String, Value>,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            num_workers: 5,
            timesteps_per_batch: 40_000,
            horizon: None,

            gamma: 0.995,
            gae_lambda: 1.0,
            use_gae: true,
            kl_coeff: 0.2,
            kl_target: 0.01,
            clip_param: 0.3,
            entropy_coeff: 0.0,

            num_sgd_iter: 30,
            sgd_stepsize: 5e-5,
            sgd_batchsize: 128,

            model: ModelConfig::default(),
            observation_filter: "MeanStdFilter".to_string(),

            env_config: BTreeMap::new(),
        }
    }
}

impl PpoConfig {
    pub fn with_num_workers(mut self, workers: u32) -> Self {
        self.num_workers = workers;
        self
    }

    /// Set the batch size and cap the minibatch to it
    pub fn with_timesteps_per_batch(mut self, timesteps: u64) -> Self {
        self.timesteps_per_batch = timesteps;
        self.sgd_batchsize = sgd_batch_size(timesteps);
        self
    }

    pub fn with_horizon(mut self, horizon: u64) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.gae_lambda = lambda;
        self
    }

    pub fn with_kl_target(mut self, kl_target: f64) -> Self {
        self.kl_target = kl_target;
        self
    }

    pub fn with_num_sgd_iter(mut self, iters: u32) -> Self {
        self.num_sgd_iter = iters;
        self
    }

    pub fn with_fcnet_hiddens(mut self, hiddens: Vec<usize>) -> Self {
        self.model.fcnet_hiddens = hiddens;
        self
    }

    /// Attach serialized flow parameters for the environment factory
    pub fn with_flow_params(mut self, flow_json: impl Into<String>) -> Self {
        self.env_config
            .insert(FLOW_PARAMS_KEY.to_string(), Value::String(flow_json.into()));
        self
    }

    /// Serialized flow parameters, if attached
    pub fn flow_params(&self) -> Option<&str> {
        self.env_config.get(FLOW_PARAMS_KEY).and_then(Value::as_str)
    }
}

/// Steps per training iteration for `rollouts` episodes of `horizon` steps.
pub fn timesteps_per_batch(horizon: u64, rollouts: u64) -> u64 {
    horizon * rollouts
}

/// SGD minibatch size for a batch of `timesteps_per_batch` steps.
pub fn sgd_batch_size(timesteps_per_batch: u64) -> u64 {
    timesteps_per_batch.min(MAX_SGD_BATCH_SIZE)
}
