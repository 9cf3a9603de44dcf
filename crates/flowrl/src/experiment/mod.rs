//! Training job configuration.
//!
//! Provides:
//! - `PpoConfig` - Hyperparameters for the external PPO trainer
//! - `ExperimentSpec` - One job: algorithm, environment, stop criteria, resources
//! - `ClusterConfig` - Local runtime settings

mod job;
mod ppo;

pub use job::{Algorithm, ClusterConfig, ExperimentSpec, Experiments, StopCriteria, TrialResources};
pub use ppo::{
    sgd_batch_size, timesteps_per_batch, ModelConfig, PpoConfig, FLOW_PARAMS_KEY,
    MAX_SGD_BATCH_SIZE,
};
