//! Environment traits and the ring-road environment.
//!
//! Provides the `Environment` trait a trainer steps, the `TrafficKernel`
//! bridge to the external simulator, and the partially observed
//! wave-attenuation environment built on both.

mod kernel;
mod traits;
mod wave_attenuation;

pub use kernel::{
    KernelProvider, RlCommand, TrafficKernel, TrafficState, UnlinkedKernel, VehicleState,
};
pub use traits::{EnvInfo, Environment, StepResult};
pub use wave_attenuation::{WaveAttenuationPoEnv, WaveConfig, ENV_NAME, REQUIRED_ENV_PARAMS};
