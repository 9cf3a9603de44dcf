//! The flow-parameter bundle.

use super::{EnvParams, InitialConfig, NetParams, SumoParams, Vehicles};
use crate::{FlowError, Result};
use serde::{Deserialize, Serialize};

/// Everything needed to rebuild an experiment's scenario and environment.
///
/// Built once through [`FlowParamsBuilder`] and shared read-only afterwards
/// (wrap it in an `Arc` to hand it to environment factories).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowParams {
    /// Name of the experiment
    pub exp_tag: String,
    /// Environment class the experiment runs on
    pub env_name: String,
    /// Scenario class
    pub scenario: String,
    /// Generator used to create the network configuration
    pub generator: String,
    pub sumo: SumoParams,
    pub env: EnvParams,
    pub net: NetParams,
    pub veh: Vehicles,
    pub initial: InitialConfig,
}

impl FlowParams {
    pub fn builder(exp_tag: impl Into<String>) -> FlowParamsBuilder {
        FlowParamsBuilder::new(exp_tag)
    }

    /// Check the bundle can be encoded and placed.
    pub fn validate(&self) -> Result<()> {
        if self.exp_tag.is_empty() {
            return Err(FlowError::InvalidParam {
                field: "exp_tag".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.veh.num_vehicles() == 0 {
            return Err(FlowError::InvalidParam {
                field: "veh".to_string(),
                reason: "no vehicles to place".to_string(),
            });
        }
        self.sumo.check_finite()?;
        self.veh.check_finite()?;
        self.initial.check_finite()
    }
}

/// Builder for [`FlowParams`].
#[derive(Clone, Debug)]
pub struct FlowParamsBuilder {
    exp_tag: String,
    env_name: String,
    scenario: String,
    generator: String,
    sumo: SumoParams,
    env: EnvParams,
    net: NetParams,
    veh: Vehicles,
    initial: InitialConfig,
}

impl FlowParamsBuilder {
    pub fn new(exp_tag: impl Into<String>) -> Self {
        Self {
            exp_tag: exp_tag.into(),
            env_name: "WaveAttenuationPOEnv".to_string(),
            scenario: "LoopScenario".to_string(),
            generator: "CircleGenerator".to_string(),
            sumo: SumoParams::default(),
            env: EnvParams::default(),
            net: NetParams::default(),
            veh: Vehicles::default(),
            initial: InitialConfig::default(),
        }
    }

    pub fn env_name(mut self, name: impl Into<String>) -> Self {
        self.env_name = name.into();
        self
    }

    pub fn scenario(mut self, name: impl Into<String>) -> Self {
        self.scenario = name.into();
        self
    }

    pub fn generator(mut self, name: impl Into<String>) -> Self {
        self.generator = name.into();
        self
    }

    pub fn sumo(mut self, sumo: SumoParams) -> Self {
        self.sumo = sumo;
        self
    }

    pub fn env(mut self, env: EnvParams) -> Self {
        self.env = env;
        self
    }

    pub fn net(mut self, net: NetParams) -> Self {
        self.net = net;
        self
    }

    pub fn vehicles(mut self, veh: Vehicles) -> Self {
        self.veh = veh;
        self
    }

    pub fn initial(mut self, initial: InitialConfig) -> Self {
        self.initial = initial;
        self
    }

    /// Finish the bundle, validating it.
    pub fn build(self) -> Result<FlowParams> {
        let params = FlowParams {
            exp_tag: self.exp_tag,
            env_name: self.env_name,
            scenario: self.scenario,
            generator: self.generator,
            sumo: self.sumo,
            env: self.env,
            net: self.net,
            veh: self.veh,
            initial: self.initial,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{AccelController, VehicleType};

    fn vehicles() -> Vehicles {
        let mut veh = Vehicles::new();
        veh.add(VehicleType::new("rl", 1).with_acceleration(AccelController::Rl))
            .unwrap();
        veh
    }

    #[test]
    fn test_builder_defaults() {
        let params = FlowParams::builder("ring").vehicles(vehicles()).build().unwrap();
        assert_eq!(params.exp_tag, "ring");
        assert_eq!(params.env_name, "WaveAttenuationPOEnv");
        assert_eq!(params.scenario, "LoopScenario");
        assert_eq!(params.generator, "CircleGenerator");
    }

    #[test]
    fn test_empty_population_rejected() {
        let err = FlowParams::builder("ring").build().unwrap_err();
        assert!(matches!(err, FlowError::InvalidParam { ref field, .. } if field == "veh"));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = FlowParams::builder("ring")
            .vehicles(vehicles())
            .sumo(SumoParams::default().with_sim_step(f64::NAN))
            .build()
            .unwrap_err();
        assert!(matches!(err, FlowError::Encode(_)));
    }
}
