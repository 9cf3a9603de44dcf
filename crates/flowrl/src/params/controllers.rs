//! Controller selectors and their parameter sets.
//!
//! Every controller serializes as a `[ClassName, {params}]` pair, which is the
//! layout downstream simulation tooling expects in replay files. Parameter
//! structs only carry the fields an experiment sets explicitly; everything
//! left as `None` falls back to the backend's defaults and is omitted from
//! the encoded form.

use crate::{FlowError, Result};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameter set for controllers that take none.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoParams {}

/// Intelligent Driver Model car-following parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdmParams {
    /// Desirable velocity (m/s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v0: Option<f64>,
    /// Safe time headway (s)
    #[serde(rename = "T", skip_serializing_if = "Option::is_none")]
    pub time_headway: Option<f64>,
    /// Maximum acceleration (m/s^2)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<f64>,
    /// Comfortable deceleration (m/s^2)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<f64>,
    /// Acceleration exponent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    /// Linear jam distance (m)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s0: Option<f64>,
    /// Std. deviation of the gaussian noise added to accelerations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<f64>,
    /// Fail-safe policy name applied by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_safe: Option<String>,
}

impl IdmParams {
    /// Set acceleration noise
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Set desirable velocity
    pub fn with_v0(mut self, v0: f64) -> Self {
        self.v0 = Some(v0);
        self
    }

    fn floats(&self) -> [(&'static str, Option<f64>); 7] {
        [
            ("v0", self.v0),
            ("T", self.time_headway),
            ("a", self.a),
            ("b", self.b),
            ("delta", self.delta),
            ("s0", self.s0),
            ("noise", self.noise),
        ]
    }
}

/// Optimal Velocity Model parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OvmParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    /// Headway below which the vehicle stops (m)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_st: Option<f64>,
    /// Headway above which the vehicle drives at v_max (m)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_go: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<f64>,
}

impl OvmParams {
    fn floats(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("h_st", self.h_st),
            ("h_go", self.h_go),
            ("v_max", self.v_max),
            ("noise", self.noise),
        ]
    }
}

/// Follower-stopper parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FollowerStopperParams {
    /// Desired velocity (m/s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_des: Option<f64>,
}

/// Longitudinal (acceleration) controller.
#[derive(Clone, Debug, PartialEq)]
pub enum AccelController {
    Idm(IdmParams),
    Ovm(OvmParams),
    FollowerStopper(FollowerStopperParams),
    /// Accelerations are supplied by the learning agent.
    Rl,
    /// The backend's built-in car-following model.
    SumoCarFollowing,
}

impl AccelController {
    pub fn class_name(&self) -> &'static str {
        match self {
            AccelController::Idm(_) => "IDMController",
            AccelController::Ovm(_) => "OVMController",
            AccelController::FollowerStopper(_) => "FollowerStopper",
            AccelController::Rl => "RLController",
            AccelController::SumoCarFollowing => "SumoCarFollowingController",
        }
    }

    /// Whether this vehicle is driven by the agent
    pub fn is_rl(&self) -> bool {
        matches!(self, AccelController::Rl)
    }

    pub(crate) fn check_finite(&self, veh_id: &str) -> Result<()> {
        let floats: Vec<(&'static str, Option<f64>)> = match self {
            AccelController::Idm(p) => p.floats().to_vec(),
            AccelController::Ovm(p) => p.floats().to_vec(),
            AccelController::FollowerStopper(p) => vec![("v_des", p.v_des)],
            AccelController::Rl | AccelController::SumoCarFollowing => Vec::new(),
        };
        for (name, value) in floats {
            if let Some(v) = value {
                ensure_finite(&format!("veh.{}.{}.{}", veh_id, self.class_name(), name), v)?;
            }
        }
        Ok(())
    }
}

impl Default for AccelController {
    fn default() -> Self {
        AccelController::SumoCarFollowing
    }
}

impl Serialize for AccelController {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match self {
            AccelController::Idm(p) => serialize_tagged(serializer, self.class_name(), p),
            AccelController::Ovm(p) => serialize_tagged(serializer, self.class_name(), p),
            AccelController::FollowerStopper(p) => {
                serialize_tagged(serializer, self.class_name(), p)
            }
            AccelController::Rl | AccelController::SumoCarFollowing => {
                serialize_tagged(serializer, self.class_name(), &NoParams {})
            }
        }
    }
}

impl<'de> Deserialize<'de> for AccelController {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let (class, params) = <(String, Value)>::deserialize(deserializer)?;
        match class.as_str() {
            "IDMController" => params_from(&class, params).map(AccelController::Idm),
            "OVMController" => params_from(&class, params).map(AccelController::Ovm),
            "FollowerStopper" => params_from(&class, params).map(AccelController::FollowerStopper),
            "RLController" => params_from::<NoParams, _>(&class, params).map(|_| AccelController::Rl),
            "SumoCarFollowingController" => {
                params_from::<NoParams, _>(&class, params).map(|_| AccelController::SumoCarFollowing)
            }
            other => Err(de::Error::custom(format!(
                "unknown acceleration controller `{}`",
                other
            ))),
        }
    }
}

/// Lateral (lane-change) controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LaneChangeController {
    /// Lane changes decided by the backend.
    #[default]
    SumoLaneChange,
    /// Never change lanes.
    Static,
}

impl LaneChangeController {
    pub fn class_name(&self) -> &'static str {
        match self {
            LaneChangeController::SumoLaneChange => "SumoLaneChangeController",
            LaneChangeController::Static => "StaticLaneChanger",
        }
    }
}

impl Serialize for LaneChangeController {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serialize_tagged(serializer, self.class_name(), &NoParams {})
    }
}

impl<'de> Deserialize<'de> for LaneChangeController {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let (class, params) = <(String, Value)>::deserialize(deserializer)?;
        let controller = match class.as_str() {
            "SumoLaneChangeController" => LaneChangeController::SumoLaneChange,
            "StaticLaneChanger" => LaneChangeController::Static,
            other => {
                return Err(de::Error::custom(format!(
                    "unknown lane-change controller `{}`",
                    other
                )))
            }
        };
        params_from::<NoParams, D::Error>(&class, params)?;
        Ok(controller)
    }
}

/// Routing controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Router {
    /// Re-route onto the next edge of a closed loop forever.
    Continuous,
    /// Route along a grid network.
    Grid,
}

impl Router {
    pub fn class_name(&self) -> &'static str {
        match self {
            Router::Continuous => "ContinuousRouter",
            Router::Grid => "GridRouter",
        }
    }
}

impl Serialize for Router {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serialize_tagged(serializer, self.class_name(), &NoParams {})
    }
}

impl<'de> Deserialize<'de> for Router {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let (class, params) = <(String, Value)>::deserialize(deserializer)?;
        let router = match class.as_str() {
            "ContinuousRouter" => Router::Continuous,
            "GridRouter" => Router::Grid,
            other => return Err(de::Error::custom(format!("unknown router `{}`", other))),
        };
        params_from::<NoParams, D::Error>(&class, params)?;
        Ok(router)
    }
}

fn serialize_tagged<S: Serializer, P: Serialize>(
    serializer: S,
    class: &str,
    params: &P,
) -> core::result::Result<S::Ok, S::Error> {
    let mut pair = serializer.serialize_tuple(2)?;
    pair.serialize_element(class)?;
    pair.serialize_element(params)?;
    pair.end()
}

fn params_from<T: DeserializeOwned, E: de::Error>(
    class: &str,
    params: Value,
) -> core::result::Result<T, E> {
    serde_json::from_value(params).map_err(|e| E::custom(format!("{} params: {}", class, e)))
}

pub(crate) fn ensure_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FlowError::Encode(format!(
            "{} = {} is not representable in JSON",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_idm_encodes_only_set_fields() {
        let ctrl = AccelController::Idm(IdmParams::default().with_noise(0.2));
        let value = serde_json::to_value(&ctrl).unwrap();
        assert_eq!(value, json!(["IDMController", {"noise": 0.2}]));
    }

    #[test]
    fn test_rl_controller_has_empty_params() {
        let value = serde_json::to_value(AccelController::Rl).unwrap();
        assert_eq!(value, json!(["RLController", {}]));
    }

    #[test]
    fn test_unknown_controller_rejected() {
        let err = serde_json::from_value::<AccelController>(json!(["PIDController", {}]))
            .unwrap_err();
        assert!(err.to_string().contains("PIDController"));
    }

    #[test]
    fn test_unknown_param_rejected() {
        let res = serde_json::from_value::<AccelController>(json!(["IDMController", {"nois": 1}]));
        assert!(res.is_err());

        let res = serde_json::from_value::<Router>(json!(["ContinuousRouter", {"x": 1}]));
        assert!(res.is_err());
    }

    #[test]
    fn test_idm_time_headway_uses_class_field_name() {
        let ctrl = AccelController::Idm(IdmParams {
            time_headway: Some(1.5),
            ..Default::default()
        });
        let value = serde_json::to_value(&ctrl).unwrap();
        assert_eq!(value[1]["T"], json!(1.5));

        let back: AccelController = serde_json::from_value(value).unwrap();
        assert_eq!(back, ctrl);
    }

    #[test]
    fn test_non_finite_param_detected() {
        let ctrl = AccelController::Idm(IdmParams::default().with_noise(f64::NAN));
        let err = ctrl.check_finite("human").unwrap_err();
        assert!(matches!(err, FlowError::Encode(_)));
        assert!(err.to_string().contains("veh.human.IDMController.noise"));
    }
}
