//! Stage and transition types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline stage, ordered from least to most trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Context,
    Plan,
    Gates,
    Route,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Context, Stage::Plan, Stage::Gates, Stage::Route];

    /// One stage up, saturating at ROUTE
    pub fn next(self) -> Stage {
        match self {
            Stage::Context => Stage::Plan,
            Stage::Plan => Stage::Gates,
            Stage::Gates | Stage::Route => Stage::Route,
        }
    }

    /// One stage down, saturating at CONTEXT
    pub fn prev(self) -> Stage {
        match self {
            Stage::Context | Stage::Plan => Stage::Context,
            Stage::Gates => Stage::Plan,
            Stage::Route => Stage::Gates,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Context => "CONTEXT",
            Stage::Plan => "PLAN",
            Stage::Gates => "GATES",
            Stage::Route => "ROUTE",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

/// Answer to a stage query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDecision {
    /// Stage after this decision
    pub stage: Stage,
    pub should_transition: bool,
    pub reason: String,
}

/// Audit state for one tracked key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub key: String,
    pub stage: Stage,
    /// Stage held before the last promotion, cleared on demotion
    pub promoted_from: Option<Stage>,
    /// Time of the last applied transition; `None` until the first one
    pub last_transition: Option<DateTime<Utc>>,
    pub last_score: f64,
    pub last_reason: String,
    pub first_seen: DateTime<Utc>,
    pub transitions: u64,
}

impl TransitionRecord {
    pub(crate) fn new(key: &str, stage: Stage, now: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            stage,
            promoted_from: None,
            last_transition: None,
            last_score: f64::NAN,
            last_reason: String::new(),
            first_seen: now,
            transitions: 0,
        }
    }
}

/// Published on every applied transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransitionEvent {
    pub key: String,
    pub from: Stage,
    pub to: Stage,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Context < Stage::Plan);
        assert!(Stage::Plan < Stage::Gates);
        assert!(Stage::Gates < Stage::Route);
        assert_eq!(Stage::Route.next(), Stage::Route);
        assert_eq!(Stage::Context.prev(), Stage::Context);
        assert_eq!(Stage::Gates.prev(), Stage::Plan);
    }

    #[test]
    fn test_stage_serde_and_parse() {
        assert_eq!(serde_json::to_string(&Stage::Route).unwrap(), "\"ROUTE\"");
        assert_eq!("plan".parse::<Stage>().unwrap(), Stage::Plan);
        assert!("launch".parse::<Stage>().is_err());
    }
}
