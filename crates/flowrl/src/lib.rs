//! # flowrl
//!
//! Experiment assembly for ring-road traffic reinforcement learning.
//!
//! ## Overview
//!
//! flowrl provides:
//! - A typed parameter model for traffic scenarios (`FlowParams`, `Vehicles`,
//!   tagged controller variants)
//! - Deterministic JSON encoding of those parameters for replay
//! - The `Environment` trait and a partial-observation ring environment that
//!   drives an external `TrafficKernel`
//! - An explicit `EnvRegistry` for named environment factories
//! - PPO job configuration and the `ExperimentRunner` submission seam
//!
//! Vehicle dynamics and the learning algorithm are not part of this crate:
//! they sit behind `TrafficKernel` and `ExperimentRunner` respectively.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowrl::prelude::*;
//!
//! let params = Arc::new(my_flow_params()?);
//! let flow_json = encode_flow_params(&params)?;
//!
//! let mut registry = EnvRegistry::new();
//! let (creator, env_name) = make_create_env(params, 0, provider)?;
//! registry.register(&env_name, creator)?;
//!
//! let mut runner = ManifestRunner::new("results");
//! runner.init(&ClusterConfig::new(2))?;
//! let trials = runner.run_experiments(&experiments, &registry)?;
//! ```

pub mod encoding;
pub mod env;
pub mod experiment;
pub mod params;
pub mod registry;
pub mod replay;
pub mod runner;
pub mod scenario;
pub mod spaces;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::encoding::{decode_flow_params, encode_flow_params, to_canonical_json};
    pub use crate::env::{
        EnvInfo, Environment, KernelProvider, StepResult, TrafficKernel, TrafficState,
        WaveAttenuationPoEnv,
    };
    pub use crate::experiment::{
        Algorithm, ClusterConfig, ExperimentSpec, Experiments, PpoConfig, StopCriteria,
        TrialResources,
    };
    pub use crate::params::{
        AccelController, EnvParams, FlowParams, InitialConfig, LaneChangeController, NetParams,
        Router, SumoParams, VehicleType, Vehicles,
    };
    pub use crate::registry::{make_create_env, EnvCreator, EnvRegistry};
    pub use crate::runner::{ExperimentRunner, ManifestRunner, Trial, TrialStatus};
    pub use crate::scenario::RingScenario;
    pub use crate::spaces::BoxSpace;
    pub use std::sync::Arc;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Vehicle type `{0}` is already defined")]
    DuplicateVehicleType(String),

    #[error("Invalid parameter {field}: {reason}")]
    InvalidParam { field: String, reason: String },

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Network parameter \"{0}\" not supplied")]
    MissingNetParam(String),

    #[error("Environment parameter \"{0}\" not supplied")]
    MissingEnvParam(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("{vehicles} vehicles do not fit on a {length} m ring with {lanes} lane(s)")]
    ScenarioCapacity {
        vehicles: usize,
        length: f64,
        lanes: u32,
    },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Simulation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Environment `{0}` is already registered")]
    DuplicateEnv(String),

    #[error("Environment `{0}` is not registered")]
    UnregisteredEnv(String),

    #[error("Runner not initialized; call init() first")]
    NotInitialized,

    #[error("Experiment `{experiment}` requests {requested} {resource}, cluster has {available}")]
    InsufficientResources {
        experiment: String,
        resource: &'static str,
        requested: u32,
        available: u32,
    },

    #[error("Invalid job `{experiment}`: {reason}")]
    InvalidJob { experiment: String, reason: String },

    #[error("Config has no `env_config.flow_params` entry")]
    MissingFlowParams,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        // Encoding paths map their errors explicitly; anything arriving here is a read.
        if err.is_io() {
            FlowError::IoError(err.into())
        } else {
            FlowError::Decode(err.to_string())
        }
    }
}

pub type Result<T> = core::result::Result<T, FlowError>;
