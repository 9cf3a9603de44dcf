//! Experiment parameter model.
//!
//! Provides:
//! - `Vehicles` / `VehicleType` - the vehicle population descriptor
//! - `AccelController`, `LaneChangeController`, `Router` - tagged controller variants
//! - `SumoParams`, `EnvParams`, `NetParams`, `InitialConfig` - per-layer parameters
//! - `FlowParams` - the immutable bundle threaded into environment factories

mod controllers;
mod settings;
mod flow;
mod vehicles;

pub use settings::{AdditionalParams, EnvParams, InitialConfig, NetParams, Spacing, SumoParams};
pub use controllers::{
    AccelController, FollowerStopperParams, IdmParams, LaneChangeController, NoParams, OvmParams,
    Router,
};
pub use flow::{FlowParams, FlowParamsBuilder};
pub use vehicles::{LaneChangeMode, SpeedMode, VehicleType, Vehicles};
