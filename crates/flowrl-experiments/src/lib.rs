//! Experiment definitions for flowrl.
//!
//! Provides ready-made experiments:
//! - `stabilizing_the_ring` - One agent damping stop-and-go waves on a
//!   variable-length single-lane ring

pub mod stabilizing_the_ring;

/// Name and one-line description of every bundled experiment
pub const EXPERIMENTS: [(&str, &str); 1] = [(
    stabilizing_the_ring::EXP_TAG,
    "1 RL vehicle among 21 IDM drivers on a 220-270 m ring",
)];
