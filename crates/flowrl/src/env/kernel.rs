//! Bridge to the external traffic simulator.
//!
//! The simulator owns vehicle dynamics and the human-driver controllers; the
//! environment only reads its state and forwards agent accelerations.

use crate::params::SumoParams;
use crate::scenario::RingScenario;
use crate::{FlowError, Result};

/// Snapshot of one vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleState {
    pub id: String,
    /// `veh_id` of the vehicle type it was spawned from
    pub type_id: String,
    /// Distance along the ring (m)
    pub position: f64,
    /// Speed (m/s)
    pub speed: f64,
    pub lane: u32,
    /// Driven by the agent
    pub rl: bool,
}

/// Snapshot of the whole network after a simulation step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrafficState {
    pub vehicles: Vec<VehicleState>,
    /// A collision occurred during the last step
    pub crashed: bool,
    /// Simulated time (s)
    pub time: f64,
}

impl TrafficState {
    /// Indices of agent vehicles, ordered by id
    pub fn rl_indices(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.vehicles.len())
            .filter(|&i| self.vehicles[i].rl)
            .collect();
        idx.sort_by(|&a, &b| self.vehicles[a].id.cmp(&self.vehicles[b].id));
        idx
    }

    /// Closest vehicle ahead of `idx` in the same lane, or `idx` itself if
    /// it drives alone.
    pub fn leader_of(&self, idx: usize, ring_length: f64) -> usize {
        let me = &self.vehicles[idx];
        self.vehicles
            .iter()
            .enumerate()
            .filter(|(j, v)| *j != idx && v.lane == me.lane)
            .map(|(j, v)| (j, (v.position - me.position).rem_euclid(ring_length)))
            .filter(|(_, gap)| *gap > 0.0)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(idx, |(j, _)| j)
    }

    pub fn speeds(&self) -> impl Iterator<Item = f64> + '_ {
        self.vehicles.iter().map(|v| v.speed)
    }
}

/// Acceleration for one agent vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct RlCommand {
    pub veh_id: String,
    pub acceleration: f64,
}

/// A running simulation instance.
pub trait TrafficKernel: Send {
    /// Build the network for `scenario` and place its vehicles.
    fn generate(&mut self, scenario: &RingScenario, seed: Option<u64>) -> Result<TrafficState>;

    /// Advance one simulation step, applying agent accelerations.
    ///
    /// An empty command slice leaves agent vehicles to the backend.
    fn step(&mut self, commands: &[RlCommand]) -> Result<TrafficState>;

    /// Shut the simulation down
    fn close(&mut self) {}
}

/// Opens kernels for a given backend configuration.
pub trait KernelProvider: Send + Sync {
    fn connect(&self, sumo: &SumoParams) -> Result<Box<dyn TrafficKernel>>;
}

/// Provider used when no simulator is linked into the process.
///
/// Registration and submission work without a simulator; only building an
/// environment instance fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnlinkedKernel;

impl KernelProvider for UnlinkedKernel {
    fn connect(&self, sumo: &SumoParams) -> Result<Box<dyn TrafficKernel>> {
        Err(FlowError::BackendUnavailable(format!(
            "no kernel linked for `{}`",
            sumo.sumo_binary
        )))
    }
}
