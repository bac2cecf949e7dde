//! Hysteresis stage manager

use super::types::{Stage, StageDecision, StageTransitionEvent, TransitionRecord};
use crate::config::{StageConfig, StagePolicy};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Per-key stage state machine with hysteresis and minimum dwell time
///
/// A key is promoted when its score reaches the threshold, held while the
/// score stays within `hysteresis_margin` below it, and demoted only once
/// it falls under `threshold - hysteresis_margin`. Any transition that
/// would land within `min_hold_secs` of the key's previous transition is
/// suppressed, whether it is a promotion or a demotion.
///
/// Each decision runs while holding the key's map entry, so decisions for
/// one key are strictly ordered and keys never see each other's state.
pub struct StageManager {
    config: StageConfig,
    records: DashMap<String, TransitionRecord>,
    events: broadcast::Sender<StageTransitionEvent>,
}

impl Default for StageManager {
    fn default() -> Self {
        Self::new(StageConfig::default())
    }
}

impl StageManager {
    pub fn new(config: StageConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            records: DashMap::new(),
            events,
        }
    }

    /// Configured promotion threshold
    pub fn threshold(&self) -> f64 {
        self.config.promote_threshold
    }

    /// Minimum time between transitions for one key
    ///
    /// Saturates at `Duration::MAX` for values chrono cannot represent.
    pub fn min_hold(&self) -> Duration {
        i64::try_from(self.config.min_hold_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Subscribe to applied transitions
    pub fn subscribe(&self) -> broadcast::Receiver<StageTransitionEvent> {
        self.events.subscribe()
    }

    /// Decide the next stage for `key` at the current time
    pub fn next_stage(&self, key: &str, current: Stage, score: f64, threshold: f64) -> StageDecision {
        self.next_stage_at(key, current, score, threshold, Utc::now())
    }

    /// Decide the next stage for `key` as of `now`
    ///
    /// `current` seeds the record on first observation. Afterwards the
    /// recorded stage is authoritative.
    pub fn next_stage_at(
        &self,
        key: &str,
        current: Stage,
        score: f64,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> StageDecision {
        let mut entry = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| TransitionRecord::new(key, current, now));
        let record = entry.value_mut();
        let from = record.stage;

        if from != current {
            tracing::debug!(key, recorded = %from, supplied = %current, "Using recorded stage");
        }

        if !score.is_finite() {
            return StageDecision {
                stage: from,
                should_transition: false,
                reason: format!("Holding {}: non-finite score ignored", from),
            };
        }
        record.last_score = score;

        let Some((to, reason)) = self.target(record, score, threshold) else {
            let reason = format!("Holding {}", from);
            record.last_reason = reason.clone();
            return StageDecision {
                stage: from,
                should_transition: false,
                reason,
            };
        };

        let min_hold = self.min_hold();
        if let Some(last) = record.last_transition {
            let held = now - last;
            if held < min_hold {
                increment(CounterMetric::StageHoldSuppressed);
                let remaining = min_hold
                    .checked_sub(&held)
                    .unwrap_or(Duration::MAX)
                    .num_seconds()
                    .max(0);
                let reason = format!(
                    "Holding {}: min hold time not elapsed ({}s remaining before {} to {})",
                    from, remaining, if to > from { "promotion" } else { "demotion" }, to
                );
                tracing::debug!(key, stage = %from, target = %to, remaining, "Transition suppressed");
                record.last_reason = reason.clone();
                return StageDecision {
                    stage: from,
                    should_transition: false,
                    reason,
                };
            }
        }

        record.promoted_from = if to > from { Some(from) } else { None };
        record.stage = to;
        record.last_transition = Some(now);
        record.last_reason = reason.clone();
        record.transitions += 1;

        increment(CounterMetric::StageTransitions);
        tracing::info!(key, from = %from, to = %to, score, threshold, "Stage transition");

        // Sent while the entry is held so per-key event order matches decisions
        let _ = self.events.send(StageTransitionEvent {
            key: key.to_string(),
            from,
            to,
            reason: reason.clone(),
            timestamp: now,
        });
        drop(entry);
        set_gauge(GaugeMetric::StageKeys, self.records.len() as f64);

        StageDecision {
            stage: to,
            should_transition: true,
            reason,
        }
    }

    /// Where hysteresis alone would move the key, before the hold check
    fn target(&self, record: &TransitionRecord, score: f64, threshold: f64) -> Option<(Stage, String)> {
        let from = record.stage;
        let floor = threshold - self.config.hysteresis_margin.max(0.0);

        if score >= threshold {
            if from == Stage::Route {
                return None;
            }
            let to = match self.config.policy {
                StagePolicy::Direct => Stage::Route,
                StagePolicy::OneStep => from.next(),
            };
            return Some((
                to,
                format!("Promoting to {} (score {:.2} >= {:.2})", to, score, threshold),
            ));
        }

        if score >= floor || from == Stage::Context {
            return None;
        }

        let to = match self.config.policy {
            StagePolicy::Direct => record
                .promoted_from
                .filter(|prev| *prev < from)
                .unwrap_or_else(|| from.prev()),
            StagePolicy::OneStep => from.prev(),
        };
        Some((
            to,
            format!("Demoting to {} (score {:.2} < {:.2})", to, score, floor),
        ))
    }

    /// Current stage of a tracked key
    pub fn stage_of(&self, key: &str) -> Option<Stage> {
        self.records.get(key).map(|r| r.stage)
    }

    /// Audit record for one key
    pub fn get_last_transition(&self, key: &str) -> Option<TransitionRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }

    /// Audit records for every tracked key, ordered by key
    pub fn get_all_transitions(&self) -> Vec<TransitionRecord> {
        let mut all: Vec<TransitionRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
