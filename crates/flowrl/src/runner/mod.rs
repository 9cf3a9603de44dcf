//! Job submission.
//!
//! `ExperimentRunner` is the seam to the distributed trainer. The bundled
//! `ManifestRunner` hands jobs off by writing them to disk.

mod manifest;
mod trial;

pub use manifest::{ManifestRunner, EXPERIMENT_FILE, PARAMS_FILE};
pub use trial::{Trial, TrialStatus};

use crate::experiment::{ClusterConfig, Experiments};
use crate::registry::EnvRegistry;
use crate::Result;

/// Launches experiments on a training cluster.
pub trait ExperimentRunner {
    /// Start the runtime with the given local resources
    fn init(&mut self, cluster: &ClusterConfig) -> Result<()>;

    /// Submit every experiment and block until the runner accepts them.
    ///
    /// Each experiment's `env` must be registered in `registry`.
    fn run_experiments(
        &mut self,
        experiments: &Experiments,
        registry: &EnvRegistry,
    ) -> Result<Vec<Trial>>;
}
