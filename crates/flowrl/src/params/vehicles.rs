//! Vehicle population descriptor.

use super::controllers::{ensure_finite, AccelController, LaneChangeController, Router};
use crate::{FlowError, Result};
use serde::{Deserialize, Serialize};

/// Backend speed-mode presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMode {
    /// Backend enforces safe following distances
    #[default]
    NoCollide,
    /// Controller accelerations are applied unchecked
    Aggressive,
    /// All backend checks enabled
    AllChecks,
}

/// Backend lane-change-mode presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneChangeMode {
    #[default]
    NoLatCollide,
    Strategic,
    Aggressive,
}

/// One vehicle class and how many of it to place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VehicleType {
    pub veh_id: String,
    pub acceleration_controller: AccelController,
    pub lane_change_controller: LaneChangeController,
    pub routing_controller: Option<Router>,
    /// Speed at placement (m/s)
    pub initial_speed: f64,
    pub num_vehicles: usize,
    pub speed_mode: SpeedMode,
    pub lane_change_mode: LaneChangeMode,
}

impl VehicleType {
    pub fn new(veh_id: impl Into<String>, num_vehicles: usize) -> Self {
        Self {
            veh_id: veh_id.into(),
            acceleration_controller: AccelController::default(),
            lane_change_controller: LaneChangeController::default(),
            routing_controller: None,
            initial_speed: 0.0,
            num_vehicles,
            speed_mode: SpeedMode::default(),
            lane_change_mode: LaneChangeMode::default(),
        }
    }

    pub fn with_acceleration(mut self, controller: AccelController) -> Self {
        self.acceleration_controller = controller;
        self
    }

    pub fn with_lane_change(mut self, controller: LaneChangeController) -> Self {
        self.lane_change_controller = controller;
        self
    }

    pub fn with_routing(mut self, router: Router) -> Self {
        self.routing_controller = Some(router);
        self
    }

    pub fn with_initial_speed(mut self, speed: f64) -> Self {
        self.initial_speed = speed;
        self
    }

    pub fn with_speed_mode(mut self, mode: SpeedMode) -> Self {
        self.speed_mode = mode;
        self
    }

    pub fn is_rl(&self) -> bool {
        self.acceleration_controller.is_rl()
    }
}

/// Ordered set of vehicle types, keyed by unique `veh_id`.
///
/// Serializes as a list in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Vehicles {
    types: Vec<VehicleType>,
}

impl Vehicles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vehicle type. Fails if `veh_id` is already taken.
    pub fn add(&mut self, vehicle: VehicleType) -> Result<()> {
        if self.get(&vehicle.veh_id).is_some() {
            return Err(FlowError::DuplicateVehicleType(vehicle.veh_id));
        }
        tracing::debug!(
            veh_id = %vehicle.veh_id,
            num_vehicles = vehicle.num_vehicles,
            controller = vehicle.acceleration_controller.class_name(),
            "Added vehicle type"
        );
        self.types.push(vehicle);
        Ok(())
    }

    pub fn get(&self, veh_id: &str) -> Option<&VehicleType> {
        self.types.iter().find(|t| t.veh_id == veh_id)
    }

    pub fn types(&self) -> &[VehicleType] {
        &self.types
    }

    /// Total number of vehicles across all types
    pub fn num_vehicles(&self) -> usize {
        self.types.iter().map(|t| t.num_vehicles).sum()
    }

    /// Number of agent-controlled vehicles
    pub fn num_rl_vehicles(&self) -> usize {
        self.types
            .iter()
            .filter(|t| t.is_rl())
            .map(|t| t.num_vehicles)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn check_finite(&self) -> Result<()> {
        for t in &self.types {
            ensure_finite(&format!("veh.{}.initial_speed", t.veh_id), t.initial_speed)?;
            t.acceleration_controller.check_finite(&t.veh_id)?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for Vehicles {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> core::result::Result<Self, D::Error> {
        let types = Vec::<VehicleType>::deserialize(deserializer)?;
        let mut vehicles = Vehicles::new();
        for t in types {
            vehicles.add(t).map_err(serde::de::Error::custom)?;
        }
        Ok(vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::IdmParams;

    fn population() -> Vehicles {
        let mut vehicles = Vehicles::new();
        vehicles
            .add(
                VehicleType::new("human", 21)
                    .with_acceleration(AccelController::Idm(IdmParams::default().with_noise(0.2)))
                    .with_routing(Router::Continuous),
            )
            .unwrap();
        vehicles
            .add(
                VehicleType::new("rl", 1)
                    .with_acceleration(AccelController::Rl)
                    .with_routing(Router::Continuous),
            )
            .unwrap();
        vehicles
    }

    #[test]
    fn test_counts() {
        let vehicles = population();
        assert_eq!(vehicles.num_vehicles(), 22);
        assert_eq!(vehicles.num_rl_vehicles(), 1);
        assert_eq!(vehicles.types().len(), 2);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut vehicles = population();
        let err = vehicles.add(VehicleType::new("rl", 3)).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateVehicleType(id) if id == "rl"));
        assert_eq!(vehicles.num_vehicles(), 22);
    }

    #[test]
    fn test_serializes_as_ordered_list() {
        let value = serde_json::to_value(population()).unwrap();
        let list = value.as_array().unwrap();
        assert_eq!(list[0]["veh_id"], "human");
        assert_eq!(list[1]["veh_id"], "rl");
        assert_eq!(list[1]["routing_controller"][0], "ContinuousRouter");
        assert_eq!(list[0]["speed_mode"], "no_collide");
    }

    #[test]
    fn test_deserialize_rejects_duplicates() {
        let mut value = serde_json::to_value(population()).unwrap();
        let first = value[0].clone();
        value.as_array_mut().unwrap().push(first);
        assert!(serde_json::from_value::<Vehicles>(value).is_err());
    }
}
