//! Partially observed wave-attenuation environment on a variable-length ring.
//!
//! A single agent vehicle sees only its own speed, its leader's relative speed
//! and the headway to that leader. Each reset draws a new ring length so the
//! learned policy has to generalize across densities.

use super::kernel::{RlCommand, TrafficKernel, TrafficState};
use super::traits::{EnvInfo, Environment, StepResult};
use crate::params::FlowParams;
use crate::scenario::RingScenario;
use crate::spaces::BoxSpace;
use crate::{FlowError, Result};
use ndarray::{Array1, ArrayD};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use std::sync::Arc;

/// Registry class name for this environment.
pub const ENV_NAME: &str = "WaveAttenuationPOEnv";

/// Environment keys this environment reads from `EnvParams::additional_params`.
pub const REQUIRED_ENV_PARAMS: [&str; 3] = ["max_accel", "max_decel", "ring_length"];

/// Speed used to normalize observations (m/s)
const MAX_SPEED: f64 = 15.0;

// Reward shaping weights
const SPEED_WEIGHT: f64 = 4.0;
const SPEED_SCALE: f64 = 20.0;
const ACCEL_PENALTY: f64 = 8.0;
const ACCEL_THRESHOLD: f64 = 0.0;

/// Speeds below this mark a corrupted backend state.
const INVALID_SPEED: f64 = -100.0;

pub struct WaveAttenuationPoEnv {
    params: Arc<FlowParams>,
    kernel: Box<dyn TrafficKernel>,
    action_space: BoxSpace,
    observation_space: BoxSpace,
    ring_range: (u32, u32),
    rng: StdRng,
    ring_length: f64,
    state: TrafficState,
    step_count: u64,
    episode_return: f32,
    done: bool,
}

/// Bounds and population checks a parameter bundle must pass before an
/// environment can be built from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveConfig {
    pub max_accel: f64,
    pub max_decel: f64,
    /// Per-episode ring length range (m), inclusive
    pub ring_range: (u32, u32),
    pub num_rl: usize,
}

impl WaveConfig {
    /// Read the environment tunables and check the population fits the
    /// shortest ring. Does not touch the simulation backend.
    pub fn from_params(params: &FlowParams) -> Result<Self> {
        let max_accel = env_f64(params, "max_accel")?;
        let max_decel = env_f64(params, "max_decel")?;
        if !(max_accel >= 0.0 && max_decel.is_finite() && max_accel.is_finite()) {
            return Err(FlowError::InvalidParam {
                field: "env.max_accel".to_string(),
                reason: format!(
                    "bounds must be finite with max_accel >= 0, got {} / {}",
                    max_accel, max_decel
                ),
            });
        }
        let ring_range = ring_range(params)?;

        let num_rl = params.veh.num_rl_vehicles();
        if num_rl == 0 {
            return Err(FlowError::InvalidParam {
                field: "veh".to_string(),
                reason: format!("{} needs at least one RL vehicle", ENV_NAME),
            });
        }

        // Densest ring is the binding case for placement.
        RingScenario::from_params(params, Some(ring_range.0 as f64))?;

        Ok(Self {
            max_accel,
            max_decel,
            ring_range,
            num_rl,
        })
    }
}

impl WaveAttenuationPoEnv {
    /// Wrap `kernel` with the observation, action and reward definitions
    /// configured in `params`.
    pub fn new(params: Arc<FlowParams>, kernel: Box<dyn TrafficKernel>) -> Result<Self> {
        let WaveConfig {
            max_accel,
            max_decel,
            ring_range,
            num_rl,
        } = WaveConfig::from_params(&params)?;

        let rng = match params.sumo.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            action_space: BoxSpace::new(&[num_rl], -(max_decel.abs() as f32), max_accel as f32),
            observation_space: BoxSpace::unit(&[3]),
            params,
            kernel,
            ring_range,
            rng,
            ring_length: ring_range.1 as f64,
            state: TrafficState::default(),
            step_count: 0,
            episode_return: 0.0,
            done: false,
        })
    }

    /// Ring length of the current episode (m)
    pub fn ring_length(&self) -> f64 {
        self.ring_length
    }

    pub fn params(&self) -> &FlowParams {
        &self.params
    }

    pub fn traffic_state(&self) -> &TrafficState {
        &self.state
    }

    fn observe(&self) -> ArrayD<f32> {
        let rl = match self.state.rl_indices().first() {
            Some(&i) => i,
            None => return self.observation_space.zeros(),
        };
        let lead = self.state.leader_of(rl, self.ring_length);
        let me = &self.state.vehicles[rl];
        let leader = &self.state.vehicles[lead];
        let max_length = self.ring_range.1 as f64;

        let headway = (leader.position - me.position).rem_euclid(self.ring_length);
        Array1::from(vec![
            (me.speed / MAX_SPEED) as f32,
            ((leader.speed - me.speed) / MAX_SPEED) as f32,
            (headway / max_length) as f32,
        ])
        .into_dyn()
    }

    fn compute_reward(&self, actions: &ArrayD<f32>) -> f64 {
        if self.state.crashed || self.state.speeds().any(|v| v < INVALID_SPEED) {
            return 0.0;
        }
        let n = self.state.vehicles.len().max(1) as f64;
        let mean_speed = self.state.speeds().sum::<f64>() / n;
        let mut reward = SPEED_WEIGHT * mean_speed / SPEED_SCALE;

        let mean_accel =
            actions.iter().map(|a| (*a as f64).abs()).sum::<f64>() / actions.len().max(1) as f64;
        if mean_accel > ACCEL_THRESHOLD {
            reward += ACCEL_PENALTY * (ACCEL_THRESHOLD - mean_accel);
        }
        reward
    }
}

impl Environment for WaveAttenuationPoEnv {
    fn observation_space(&self) -> BoxSpace {
        self.observation_space.clone()
    }

    fn action_space(&self) -> BoxSpace {
        self.action_space.clone()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<(ArrayD<f32>, EnvInfo)> {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }

        let (lo, hi) = self.ring_range;
        self.ring_length = Uniform::new_inclusive(lo, hi).sample(&mut self.rng) as f64;
        let scenario = RingScenario::from_params(&self.params, Some(self.ring_length))?;

        let kernel_seed: u64 = self.rng.gen();
        self.state = self.kernel.generate(&scenario, Some(kernel_seed))?;
        for _ in 0..self.params.env.warmup_steps {
            self.state = self.kernel.step(&[])?;
        }

        self.step_count = 0;
        self.episode_return = 0.0;
        self.done = false;

        tracing::debug!(
            ring_length = self.ring_length,
            vehicles = self.state.vehicles.len(),
            "Reset ring"
        );

        let info = EnvInfo::new().with_extra("ring_length", self.ring_length as f32);
        Ok((self.observe(), info))
    }

    fn step(&mut self, action: &ArrayD<f32>) -> Result<StepResult> {
        if action.len() != self.action_space.num_elements() {
            return Err(FlowError::InvalidAction(format!(
                "expected {} accelerations, got {}",
                self.action_space.num_elements(),
                action.len()
            )));
        }
        let action = self.action_space.clip(action);

        let commands: Vec<RlCommand> = self
            .state
            .rl_indices()
            .into_iter()
            .zip(action.iter())
            .map(|(i, a)| RlCommand {
                veh_id: self.state.vehicles[i].id.clone(),
                acceleration: *a as f64,
            })
            .collect();

        for _ in 0..self.params.env.sims_per_step.max(1) {
            self.state = self.kernel.step(&commands)?;
            if self.state.crashed {
                break;
            }
        }
        self.step_count += 1;

        let reward = self.compute_reward(&action) as f32;
        self.episode_return += reward;

        let terminated = self.state.crashed;
        let truncated = self.step_count >= self.params.env.horizon;
        self.done = terminated || truncated;

        let mut info = EnvInfo::new();
        if self.done {
            info = info.with_episode_stats(self.episode_return, self.step_count);
        }

        Ok(StepResult {
            observation: self.observe(),
            reward,
            terminated,
            truncated,
            info,
        })
    }

    fn close(&mut self) {
        self.kernel.close();
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

fn env_f64(params: &FlowParams, key: &str) -> Result<f64> {
    params
        .env
        .get_f64(key)
        .ok_or_else(|| FlowError::MissingEnvParam(key.to_string()))
}

fn ring_range(params: &FlowParams) -> Result<(u32, u32)> {
    let value = params
        .env
        .additional_params
        .get("ring_length")
        .ok_or_else(|| FlowError::MissingEnvParam("ring_length".to_string()))?;
    let bounds: Option<Vec<u32>> = value.as_array().map(|a| {
        a.iter()
            .filter_map(|v| v.as_u64().and_then(|v| u32::try_from(v).ok()))
            .collect()
    });
    match bounds.as_deref() {
        Some(&[lo, hi]) if lo > 0 && lo <= hi => Ok((lo, hi)),
        _ => Err(FlowError::InvalidParam {
            field: "env.ring_length".to_string(),
            reason: format!("expected [min, max] in whole meters, got {}", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::VehicleState;
    use crate::params::{AccelController, EnvParams, NetParams, VehicleType, Vehicles};
    use ndarray::IxDyn;
    use serde_json::json;
    use std::sync::Mutex;

    /// Every vehicle cruises at a fixed speed; agent commands are recorded.
    struct CruiseKernel {
        speed: f64,
        crash_at: Option<u64>,
        steps: u64,
        length: f64,
        state: TrafficState,
        log: Arc<Mutex<Vec<Vec<RlCommand>>>>,
    }

    impl CruiseKernel {
        fn new(speed: f64) -> (Self, Arc<Mutex<Vec<Vec<RlCommand>>>>) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let kernel = Self {
                speed,
                crash_at: None,
                steps: 0,
                length: 0.0,
                state: TrafficState::default(),
                log: log.clone(),
            };
            (kernel, log)
        }
    }

    impl TrafficKernel for CruiseKernel {
        fn generate(&mut self, scenario: &RingScenario, _seed: Option<u64>) -> Result<TrafficState> {
            self.length = scenario.length;
            self.steps = 0;
            let mut ids = Vec::new();
            for t in scenario.vehicles.types() {
                for i in 0..t.num_vehicles {
                    ids.push((format!("{}_{}", t.veh_id, i), t.veh_id.clone(), t.is_rl()));
                }
            }
            self.state.vehicles = scenario
                .start_positions()
                .into_iter()
                .zip(ids)
                .map(|((position, lane), (id, type_id, rl))| VehicleState {
                    id,
                    type_id,
                    position,
                    speed: self.speed,
                    lane,
                    rl,
                })
                .collect();
            self.state.crashed = false;
            Ok(self.state.clone())
        }

        fn step(&mut self, commands: &[RlCommand]) -> Result<TrafficState> {
            self.log.lock().unwrap().push(commands.to_vec());
            self.steps += 1;
            for v in &mut self.state.vehicles {
                v.position = (v.position + v.speed * 0.1).rem_euclid(self.length);
            }
            self.state.crashed = self.crash_at == Some(self.steps);
            Ok(self.state.clone())
        }
    }

    fn wave_params(horizon: u64, warmup: u64) -> Result<FlowParams> {
        let mut veh = Vehicles::new();
        veh.add(VehicleType::new("human", 3))?;
        veh.add(VehicleType::new("rl", 1).with_acceleration(AccelController::Rl))?;
        FlowParams::builder("wave_test")
            .vehicles(veh)
            .env(
                EnvParams::new(horizon)
                    .with_warmup_steps(warmup)
                    .with_param("max_accel", 1)?
                    .with_param("max_decel", 2)?
                    .with_param("ring_length", [100, 120])?,
            )
            .net(
                NetParams::new()
                    .with_param("length", 100)?
                    .with_param("lanes", 1)?
                    .with_param("speed_limit", 30)?
                    .with_param("resolution", 40)?,
            )
            .build()
    }

    fn params(horizon: u64, warmup: u64) -> Arc<FlowParams> {
        Arc::new(wave_params(horizon, warmup).unwrap())
    }

    fn accel(a: f32) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(&[1]), a)
    }

    #[test]
    fn test_spaces() {
        let (kernel, _) = CruiseKernel::new(5.0);
        let env = WaveAttenuationPoEnv::new(params(10, 0), Box::new(kernel)).unwrap();
        assert_eq!(env.action_space(), BoxSpace::new(&[1], -2.0, 1.0));
        assert_eq!(env.observation_space(), BoxSpace::unit(&[3]));
    }

    #[test]
    fn test_reset_samples_ring_length_in_range() {
        let (kernel, _) = CruiseKernel::new(5.0);
        let mut env = WaveAttenuationPoEnv::new(params(10, 0), Box::new(kernel)).unwrap();
        for seed in 0..20 {
            let (_, info) = env.reset(Some(seed)).unwrap();
            let length = env.ring_length();
            assert!((100.0..=120.0).contains(&length));
            assert_eq!(info.get("ring_length"), Some(length as f32));
        }
    }

    #[test]
    fn test_reset_is_reproducible_with_seed() {
        let (k1, _) = CruiseKernel::new(5.0);
        let (k2, _) = CruiseKernel::new(5.0);
        let mut env1 = WaveAttenuationPoEnv::new(params(10, 0), Box::new(k1)).unwrap();
        let mut env2 = WaveAttenuationPoEnv::new(params(10, 0), Box::new(k2)).unwrap();
        let (obs1, _) = env1.reset(Some(7)).unwrap();
        let (obs2, _) = env2.reset(Some(7)).unwrap();
        assert_eq!(env1.ring_length(), env2.ring_length());
        assert_eq!(obs1, obs2);
    }

    #[test]
    fn test_warmup_steps_run_without_commands() {
        let (kernel, log) = CruiseKernel::new(5.0);
        let mut env = WaveAttenuationPoEnv::new(params(10, 4), Box::new(kernel)).unwrap();
        env.reset(Some(1)).unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert!(log.iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_observation_normalized() {
        let (kernel, _) = CruiseKernel::new(7.5);
        let mut env = WaveAttenuationPoEnv::new(params(10, 0), Box::new(kernel)).unwrap();
        let (obs, _) = env.reset(Some(3)).unwrap();
        // Four evenly spaced vehicles: headway is a quarter of the ring.
        let expected_headway = (env.ring_length() / 4.0 / 120.0) as f32;
        assert!((obs[[0]] - 0.5).abs() < 1e-6);
        assert!(obs[[1]].abs() < 1e-6);
        assert!((obs[[2]] - expected_headway).abs() < 1e-5);
    }

    #[test]
    fn test_step_clips_and_forwards_action() {
        let (kernel, log) = CruiseKernel::new(5.0);
        let mut env = WaveAttenuationPoEnv::new(params(10, 0), Box::new(kernel)).unwrap();
        env.reset(Some(0)).unwrap();
        env.step(&accel(-10.0)).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(
            log.last().unwrap(),
            &vec![RlCommand {
                veh_id: "rl_0".to_string(),
                acceleration: -2.0
            }]
        );
    }

    #[test]
    fn test_reward_penalizes_acceleration() {
        let (kernel, _) = CruiseKernel::new(10.0);
        let mut env = WaveAttenuationPoEnv::new(params(10, 0), Box::new(kernel)).unwrap();
        env.reset(Some(0)).unwrap();

        let idle = env.step(&accel(0.0)).unwrap();
        assert!((idle.reward - 2.0).abs() < 1e-6);

        let busy = env.step(&accel(0.5)).unwrap();
        assert!((busy.reward - (2.0 - 4.0)).abs() < 1e-6);
    }

    #[test]
    fn test_horizon_truncates() {
        let (kernel, _) = CruiseKernel::new(5.0);
        let mut env = WaveAttenuationPoEnv::new(params(3, 0), Box::new(kernel)).unwrap();
        env.reset(Some(0)).unwrap();
        assert!(!env.step(&accel(0.0)).unwrap().done());
        assert!(!env.step(&accel(0.0)).unwrap().done());
        let last = env.step(&accel(0.0)).unwrap();
        assert!(last.truncated && !last.terminated);
        assert_eq!(last.info.get("episode_length"), Some(3.0));
        assert!(env.is_done());
    }

    #[test]
    fn test_crash_terminates_with_zero_reward() {
        let (mut kernel, _) = CruiseKernel::new(5.0);
        kernel.crash_at = Some(2);
        let mut env = WaveAttenuationPoEnv::new(params(10, 0), Box::new(kernel)).unwrap();
        env.reset(Some(0)).unwrap();
        env.step(&accel(0.0)).unwrap();
        let crashed = env.step(&accel(0.0)).unwrap();
        assert!(crashed.terminated);
        assert_eq!(crashed.reward, 0.0);
    }

    #[test]
    fn test_wrong_action_size_rejected() {
        let (kernel, _) = CruiseKernel::new(5.0);
        let mut env = WaveAttenuationPoEnv::new(params(10, 0), Box::new(kernel)).unwrap();
        env.reset(Some(0)).unwrap();
        let action = ArrayD::from_elem(IxDyn(&[2]), 0.0);
        assert!(matches!(env.step(&action), Err(FlowError::InvalidAction(_))));
    }

    #[test]
    fn test_missing_env_param() {
        let mut p = (*params(10, 0)).clone();
        p.env.additional_params.remove("max_decel");
        let (kernel, _) = CruiseKernel::new(5.0);
        let err = WaveAttenuationPoEnv::new(Arc::new(p), Box::new(kernel)).err().unwrap();
        assert!(matches!(err, FlowError::MissingEnvParam(ref k) if k == "max_decel"));
    }

    #[test]
    fn test_wave_config_reads_bounds() {
        let config = WaveConfig::from_params(&params(10, 0)).unwrap();
        assert_eq!(config.max_accel, 1.0);
        assert_eq!(config.max_decel, 2.0);
        assert_eq!(config.ring_range, (100, 120));
        assert_eq!(config.num_rl, 1);
    }

    #[test]
    fn test_wave_config_rejects_crowded_ring() {
        let mut p = (*params(10, 0)).clone();
        p.env
            .additional_params
            .insert("ring_length".to_string(), json!([10, 120]));
        assert!(matches!(
            WaveConfig::from_params(&p),
            Err(FlowError::ScenarioCapacity { .. })
        ));
    }

    #[test]
    fn test_bad_ring_range() {
        let mut p = (*params(10, 0)).clone();
        p.env
            .additional_params
            .insert("ring_length".to_string(), json!([270, 220]));
        let (kernel, _) = CruiseKernel::new(5.0);
        assert!(WaveAttenuationPoEnv::new(Arc::new(p), Box::new(kernel)).is_err());
    }
}
