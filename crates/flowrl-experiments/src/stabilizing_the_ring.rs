//! Stabilizing the ring.
//!
//! 21 human drivers following a noisy IDM share a single-lane ring with one
//! agent vehicle. The ring length is redrawn from 220-270 m every episode,
//! and PPO learns to damp the stop-and-go waves the humans produce.

use flowrl::encoding::encode_flow_params;
use flowrl::env::KernelProvider;
use flowrl::experiment::{
    sgd_batch_size, timesteps_per_batch, ClusterConfig, ExperimentSpec, Experiments, PpoConfig,
    StopCriteria, TrialResources,
};
use flowrl::params::{
    AccelController, EnvParams, FlowParams, IdmParams, NetParams, Router, SumoParams, VehicleType,
    Vehicles,
};
use flowrl::registry::{make_create_env, EnvRegistry};
use flowrl::Result;
use std::sync::Arc;

pub const EXP_TAG: &str = "stabilizing_the_ring";

/// Time steps per rollout
pub const HORIZON: u64 = 3000;
/// Rollouts per training iteration
pub const N_ROLLOUTS: u64 = 20;
/// Rollouts run in parallel
pub const PARALLEL_ROLLOUTS: u32 = 2;

pub const NUM_HUMAN: usize = 21;
pub const NUM_RL: usize = 1;
const IDM_NOISE: f64 = 0.2;

const WARMUP_STEPS: u64 = 750;
const RING_LENGTH: [u32; 2] = [220, 270];

/// Registration version of the environment
pub const ENV_VERSION: u32 = 0;
pub const TRAINING_ITERATIONS: u64 = 200;

/// Vehicle population: noisy IDM humans plus one agent.
pub fn vehicles() -> Result<Vehicles> {
    let mut veh = Vehicles::new();
    veh.add(
        VehicleType::new("human", NUM_HUMAN)
            .with_acceleration(AccelController::Idm(IdmParams::default().with_noise(IDM_NOISE)))
            .with_routing(Router::Continuous),
    )?;
    veh.add(
        VehicleType::new("rl", NUM_RL)
            .with_acceleration(AccelController::Rl)
            .with_routing(Router::Continuous),
    )?;
    Ok(veh)
}

pub fn flow_params() -> Result<FlowParams> {
    FlowParams::builder(EXP_TAG)
        .env_name("WaveAttenuationPOEnv")
        .scenario("LoopScenario")
        .generator("CircleGenerator")
        .sumo(SumoParams::default().with_sim_step(0.1).with_binary("sumo"))
        .env(
            EnvParams::new(HORIZON)
                .with_warmup_steps(WARMUP_STEPS)
                .with_param("max_accel", 1)?
                .with_param("max_decel", 1)?
                .with_param("ring_length", RING_LENGTH)?,
        )
        .net(
            NetParams::new()
                .with_param("length", 260)?
                .with_param("lanes", 1)?
                .with_param("speed_limit", 30)?
                .with_param("resolution", 40)?,
        )
        .vehicles(vehicles()?)
        .build()
}

/// PPO settings carrying the serialized flow parameters.
pub fn ppo_config(flow_json: &str) -> PpoConfig {
    let tpb = timesteps_per_batch(HORIZON, N_ROLLOUTS);
    PpoConfig {
        num_workers: PARALLEL_ROLLOUTS,
        timesteps_per_batch: tpb,
        sgd_batchsize: sgd_batch_size(tpb),
        gamma: 0.999,
        gae_lambda: 0.97,
        use_gae: true,
        kl_target: 0.02,
        num_sgd_iter: 10,
        horizon: Some(HORIZON),
        ..Default::default()
    }
    .with_fcnet_hiddens(vec![16, 16])
    .with_flow_params(flow_json)
}

pub fn experiment(env_name: &str, config: PpoConfig) -> ExperimentSpec {
    ExperimentSpec::new(env_name, config)
        .with_checkpoint_freq(20)
        .with_max_failures(999)
        .with_stop(StopCriteria::iterations(TRAINING_ITERATIONS))
        .with_repeat(3)
        .with_resources(TrialResources {
            cpu: 1,
            gpu: 0,
            extra_cpu: PARALLEL_ROLLOUTS - 1,
        })
}

pub fn cluster() -> ClusterConfig {
    ClusterConfig::new(PARALLEL_ROLLOUTS).with_redirect_output(true)
}

/// Assemble, serialize and register the experiment.
pub fn prepare(
    registry: &mut EnvRegistry,
    provider: Arc<dyn KernelProvider>,
) -> Result<Experiments> {
    prepare_from(flow_params()?, registry, provider)
}

/// Like [`prepare`], starting from caller-supplied flow parameters.
pub fn prepare_from(
    params: FlowParams,
    registry: &mut EnvRegistry,
    provider: Arc<dyn KernelProvider>,
) -> Result<Experiments> {
    let flow_json = encode_flow_params(&params)?;
    let exp_tag = params.exp_tag.clone();

    let (creator, env_name) = make_create_env(Arc::new(params), ENV_VERSION, provider)?;
    registry.register(&env_name, creator)?;

    let spec = experiment(&env_name, ppo_config(&flow_json));
    tracing::info!(
        experiment = %exp_tag,
        env = %env_name,
        timesteps_per_batch = spec.config.timesteps_per_batch,
        "Prepared experiment"
    );
    Ok(Experiments::from([(exp_tag, spec)]))
}
