//! Experiment job description and cluster settings.

use super::ppo::PpoConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Training algorithm run by the external trainer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "PPO")]
    Ppo,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Ppo => write!(f, "PPO"),
        }
    }
}

/// Conditions that end a trial; the first one reached wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_iteration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timesteps_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_reward_mean: Option<f64>,
}

impl StopCriteria {
    pub fn iterations(n: u64) -> Self {
        Self {
            training_iteration: Some(n),
            ..Default::default()
        }
    }
}

/// Resources reserved per trial
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResources {
    /// CPUs for the trainer process
    pub cpu: u32,
    pub gpu: u32,
    /// Additional CPUs for rollout workers
    pub extra_cpu: u32,
}

impl Default for TrialResources {
    fn default() -> Self {
        Self {
            cpu: 1,
            gpu: 0,
            extra_cpu: 0,
        }
    }
}

impl TrialResources {
    /// Total CPUs a trial occupies, saturating at `u32::MAX`
    pub fn total_cpu(&self) -> u32 {
        self.cpu.saturating_add(self.extra_cpu)
    }
}

/// One experiment: what to run, against which environment, until when.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub run: Algorithm,
    /// Registered environment name
    pub env: String,
    pub config: PpoConfig,
    /// Checkpoint every N iterations (0 = never)
    pub checkpoint_freq: u32,
    /// Trial restarts tolerated by the runner
    pub max_failures: u32,
    pub stop: StopCriteria,
    /// Independent trials to launch
    pub repeat: u32,
    pub trial_resources: TrialResources,
}

impl ExperimentSpec {
    pub fn new(env: impl Into<String>, config: PpoConfig) -> Self {
        Self {
            run: Algorithm::default(),
            env: env.into(),
            config,
            checkpoint_freq: 0,
            max_failures: 3,
            stop: StopCriteria::default(),
            repeat: 1,
            trial_resources: TrialResources::default(),
        }
    }

    pub fn with_checkpoint_freq(mut self, freq: u32) -> Self {
        self.checkpoint_freq = freq;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn with_stop(mut self, stop: StopCriteria) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_resources(mut self, resources: TrialResources) -> Self {
        self.trial_resources = resources;
        self
    }
}

/// Experiments keyed by tag
pub type Experiments = BTreeMap<String, ExperimentSpec>;

/// Local cluster settings applied when the runner starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub num_cpus: u32,
    pub num_gpus: u32,
    /// Send worker stdout/stderr to log files
    pub redirect_output: bool,
}

impl ClusterConfig {
    pub fn new(num_cpus: u32) -> Self {
        Self {
            num_cpus,
            num_gpus: 0,
            redirect_output: false,
        }
    }

    pub fn with_gpus(mut self, num_gpus: u32) -> Self {
        self.num_gpus = num_gpus;
        self
    }

    pub fn with_redirect_output(mut self, redirect: bool) -> Self {
        self.redirect_output = redirect;
        self
    }
}
