//! Trials launched for an experiment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single trial of an experiment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// `{run}_{env}_{index}`
    pub id: String,
    /// Experiment tag the trial belongs to
    pub experiment: String,
    /// Directory holding the trial's config and results
    pub logdir: PathBuf,
    pub status: TrialStatus,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrialStatus {
    /// Handed off, not yet picked up by a scheduler
    Pending,
    Running,
    Terminated,
    Error,
}

impl TrialStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, TrialStatus::Terminated | TrialStatus::Error)
    }
}
