//! Named environment factories.
//!
//! A registry is an explicit value handed to whoever needs to build
//! environments; there is no process-global table.

use crate::env::{Environment, KernelProvider, WaveAttenuationPoEnv, WaveConfig, ENV_NAME};
use crate::params::FlowParams;
use crate::{FlowError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds a fresh environment instance on each call.
pub type EnvCreator = Arc<dyn Fn() -> Result<Box<dyn Environment>> + Send + Sync>;

/// Maps environment names to their factories.
#[derive(Clone, Default)]
pub struct EnvRegistry {
    creators: BTreeMap<String, EnvCreator>,
}

impl EnvRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `creator` under `name`. A name can only be registered once.
    pub fn register(&mut self, name: &str, creator: EnvCreator) -> Result<()> {
        if self.creators.contains_key(name) {
            return Err(FlowError::DuplicateEnv(name.to_string()));
        }
        self.creators.insert(name.to_string(), creator);
        tracing::info!(env = %name, "Registered environment");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    /// Build a new instance of the environment registered as `name`.
    pub fn make(&self, name: &str) -> Result<Box<dyn Environment>> {
        let creator = self
            .creators
            .get(name)
            .ok_or_else(|| FlowError::UnregisteredEnv(name.to_string()))?;
        tracing::debug!(env = %name, "Creating environment");
        creator()
    }

    /// Get a factory to hand to workers
    pub fn creator(&self, name: &str) -> Option<EnvCreator> {
        self.creators.get(name).cloned()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.creators.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

impl fmt::Debug for EnvRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Build the factory for the environment named in `params` and the name to
/// register it under: `{exp_tag}-{env_name}-v{version}`.
///
/// The bundle is checked up front (required tunables, ring range, ring
/// capacity) so a bad experiment fails here rather than inside a worker.
/// Each call of the returned creator connects a new kernel through
/// `provider`, so instances never share simulator state.
pub fn make_create_env(
    params: Arc<FlowParams>,
    version: u32,
    provider: Arc<dyn KernelProvider>,
) -> Result<(EnvCreator, String)> {
    if params.env_name != ENV_NAME {
        return Err(FlowError::UnknownEnvironment(params.env_name.clone()));
    }
    WaveConfig::from_params(&params)?;
    let name = format!("{}-{}-v{}", params.exp_tag, params.env_name, version);

    let creator: EnvCreator = Arc::new(move || {
        let kernel = provider.connect(&params.sumo)?;
        let env = WaveAttenuationPoEnv::new(params.clone(), kernel)?;
        Ok(Box::new(env) as Box<dyn Environment>)
    });

    Ok((creator, name))
}
