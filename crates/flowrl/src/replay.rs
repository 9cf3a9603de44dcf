//! Recover experiment parameters from a trial's saved config.

use crate::encoding::decode_flow_params;
use crate::env::KernelProvider;
use crate::experiment::FLOW_PARAMS_KEY;
use crate::params::FlowParams;
use crate::registry::{make_create_env, EnvCreator};
use crate::runner::PARAMS_FILE;
use crate::{FlowError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Decode the flow parameters stored in a trainer config's
/// `env_config.flow_params`.
pub fn get_flow_params(config: &Value) -> Result<FlowParams> {
    let json = config
        .get("env_config")
        .and_then(|c| c.get(FLOW_PARAMS_KEY))
        .and_then(Value::as_str)
        .ok_or(FlowError::MissingFlowParams)?;
    decode_flow_params(json)
}

/// Read the trainer config saved in a trial directory.
pub fn load_trial_params(dir: impl AsRef<Path>) -> Result<Value> {
    let path = dir.as_ref().join(PARAMS_FILE);
    let text = fs::read_to_string(&path)?;
    let config = serde_json::from_str(&text)?;
    tracing::debug!(path = %path.display(), "Loaded trial params");
    Ok(config)
}

/// Flow parameters of the trial saved in `dir`.
pub fn load_flow_params(dir: impl AsRef<Path>) -> Result<FlowParams> {
    get_flow_params(&load_trial_params(dir)?)
}

/// Rebuild the environment factory a trial trained against.
pub fn replay_env(
    config: &Value,
    version: u32,
    provider: Arc<dyn KernelProvider>,
) -> Result<(EnvCreator, String)> {
    let params = get_flow_params(config)?;
    make_create_env(Arc::new(params), version, provider)
}
