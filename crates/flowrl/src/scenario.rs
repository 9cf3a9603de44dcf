//! Ring-road scenario description handed to the simulation kernel.

use crate::params::{FlowParams, InitialConfig, NetParams, Vehicles};
use crate::{FlowError, Result};
use serde::Serialize;

/// Scenario classes this crate knows how to describe.
pub const LOOP_SCENARIO: &str = "LoopScenario";
/// Network generator paired with [`LOOP_SCENARIO`].
pub const CIRCLE_GENERATOR: &str = "CircleGenerator";

/// Bumper-to-bumper length reserved per vehicle at placement (m).
pub const VEHICLE_LENGTH: f64 = 5.0;

/// Network keys a ring scenario needs.
pub const REQUIRED_NET_PARAMS: [&str; 4] = ["length", "lanes", "speed_limit", "resolution"];

/// A closed single-edge loop with its vehicle population.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RingScenario {
    pub name: String,
    /// Circumference (m)
    pub length: f64,
    pub lanes: u32,
    /// Speed limit (m/s)
    pub speed_limit: f64,
    /// Number of segments used to draw the circle
    pub resolution: u32,
    pub vehicles: Vehicles,
    pub initial: InitialConfig,
}

impl RingScenario {
    /// Describe the ring from the bundle. `length` overrides the net's `length`.
    pub fn from_params(params: &FlowParams, length: Option<f64>) -> Result<Self> {
        if params.scenario != LOOP_SCENARIO || params.generator != CIRCLE_GENERATOR {
            return Err(FlowError::UnknownScenario(format!(
                "{}/{}",
                params.scenario, params.generator
            )));
        }

        let net = &params.net;
        let length = match length {
            Some(l) => l,
            None => net_f64(net, "length")?,
        };
        let lanes = net_u32(net, "lanes")?;
        let speed_limit = net_f64(net, "speed_limit")?;
        let resolution = net_u32(net, "resolution")?;

        if !(length > 0.0) || lanes == 0 {
            return Err(FlowError::InvalidParam {
                field: "net".to_string(),
                reason: format!("length {} and lanes {} must be positive", length, lanes),
            });
        }

        let scenario = Self {
            name: params.exp_tag.clone(),
            length,
            lanes,
            speed_limit,
            resolution,
            vehicles: params.veh.clone(),
            initial: params.initial.clone(),
        };
        scenario.check_capacity()?;
        Ok(scenario)
    }

    /// Population must fit the lanes it is placed on.
    fn check_capacity(&self) -> Result<()> {
        let vehicles = self.vehicles.num_vehicles();
        let usable = (self.length - self.initial.bunching) * self.placement_lanes() as f64;
        let needed = vehicles as f64 * (VEHICLE_LENGTH + self.initial.min_gap);
        if needed > usable {
            return Err(FlowError::ScenarioCapacity {
                vehicles,
                length: self.length,
                lanes: self.lanes,
            });
        }
        Ok(())
    }

    /// Lanes used at placement
    pub fn placement_lanes(&self) -> u32 {
        self.initial
            .lanes_distribution
            .map_or(self.lanes, |n| n.clamp(1, self.lanes))
    }

    /// Evenly spaced `(position, lane)` starting slots, one per vehicle.
    ///
    /// Vehicles alternate across placement lanes; positions wrap around the
    /// ring. Random perturbation is left to the kernel.
    pub fn start_positions(&self) -> Vec<(f64, u32)> {
        let n = self.vehicles.num_vehicles();
        if n == 0 {
            return Vec::new();
        }
        let lanes = self.placement_lanes() as usize;
        let per_lane = (n + lanes - 1) / lanes;
        let spacing = (self.length - self.initial.bunching) / per_lane as f64;

        (0..n)
            .map(|i| {
                let lane = (i % lanes) as u32;
                let slot = (i / lanes) as f64;
                let pos = (self.initial.x0 + slot * spacing).rem_euclid(self.length);
                (pos, lane)
            })
            .collect()
    }
}

fn net_f64(net: &NetParams, key: &str) -> Result<f64> {
    net.additional_params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| FlowError::MissingNetParam(key.to_string()))
}

fn net_u32(net: &NetParams, key: &str) -> Result<u32> {
    net.additional_params
        .get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| FlowError::MissingNetParam(key.to_string()))
}
