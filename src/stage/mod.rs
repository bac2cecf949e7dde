//! Strategy staging pipeline
//!
//! Promotes and demotes keys (symbols or strategy ids) through ordered
//! stages using score hysteresis and a minimum dwell time, so noisy scores
//! do not cause flapping.

mod manager;
mod types;

pub use crate::config::StagePolicy;
pub use manager::StageManager;
pub use types::{Stage, StageDecision, StageTransitionEvent, TransitionRecord};
