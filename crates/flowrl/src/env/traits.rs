//! Core environment trait definitions.

use crate::spaces::BoxSpace;
use crate::Result;
use ndarray::ArrayD;

/// Information returned from environment steps
#[derive(Clone, Debug, Default)]
pub struct EnvInfo {
    /// Episode return (if done)
    pub episode_return: Option<f32>,
    /// Episode length (if done)
    pub episode_length: Option<f32>,
    /// Custom metrics
    pub extra: smallvec::SmallVec<[(&'static str, f32); 4]>,
}

impl EnvInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add episode stats
    pub fn with_episode_stats(mut self, ret: f32, len: u64) -> Self {
        self.episode_return = Some(ret);
        self.episode_length = Some(len as f32);
        self
    }

    pub fn with_extra(mut self, key: &'static str, value: f32) -> Self {
        self.extra.push((key, value));
        self
    }

    /// Get a value by key (including episode stats)
    pub fn get(&self, key: &str) -> Option<f32> {
        match key {
            "episode_return" => self.episode_return,
            "episode_length" => self.episode_length,
            _ => self.extra.iter().find(|(k, _)| k == &key).map(|(_, v)| *v),
        }
    }
}

/// Result from a single environment step
#[derive(Clone, Debug)]
pub struct StepResult {
    pub observation: ArrayD<f32>,
    pub reward: f32,
    /// Episode ended on its own (collision)
    pub terminated: bool,
    /// Episode hit the horizon
    pub truncated: bool,
    pub info: EnvInfo,
}

impl StepResult {
    /// Check if episode is done (terminated or truncated)
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Reinforcement-learning environment as seen by a trainer.
///
/// Unlike in-process toy environments, implementations here drive an
/// external simulator, so `reset` and `step` surface backend failures.
pub trait Environment: Send {
    fn observation_space(&self) -> BoxSpace;

    fn action_space(&self) -> BoxSpace;

    /// Reset to a fresh episode. `seed` makes the episode reproducible.
    fn reset(&mut self, seed: Option<u64>) -> Result<(ArrayD<f32>, EnvInfo)>;

    /// Apply one action and advance the episode.
    fn step(&mut self, action: &ArrayD<f32>) -> Result<StepResult>;

    /// Release the backend
    fn close(&mut self) {}

    /// Check if environment is done and needs reset
    fn is_done(&self) -> bool {
        false
    }
}
