//! Pure scheduling and failure policy
//!
//! Everything here is free of I/O so the decisions the refresh loop makes
//! can be tested on their own.

use crate::provider::ErrorClass;
use crate::roster::{ActiveSymbol, Tier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Lowest backoff level (healthy cadence)
pub const MIN_BACKOFF: u32 = 1;
/// Highest backoff level
pub const MAX_BACKOFF: u32 = 8;

/// Behavioural state derived from the backoff level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Backoff level 1, normal cadence
    Healthy,
    /// Backoff above 1, slowed cadence
    Degraded,
}

/// Multiplier applied to the refresh interval after failures
///
/// Moves by at most one level per outcome. A failure steps up (ceiling 8);
/// a success steps toward half the current level (floor 1), so recovery
/// from a deep outage takes several consecutive successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackoffLevel(u32);

impl BackoffLevel {
    /// Start healthy
    pub fn new() -> Self {
        Self(MIN_BACKOFF)
    }

    /// Current level
    pub fn get(self) -> u32 {
        self.0
    }

    /// Apply a failed outcome
    pub fn on_failure(&mut self) {
        self.0 = (self.0 + 1).min(MAX_BACKOFF);
    }

    /// Apply a successful outcome
    pub fn on_success(&mut self) {
        let halved = self.0.div_ceil(2);
        self.0 = halved.max(self.0.saturating_sub(1)).max(MIN_BACKOFF);
    }

    /// Healthy or degraded
    pub fn health(self) -> Health {
        if self.0 == MIN_BACKOFF {
            Health::Healthy
        } else {
            Health::Degraded
        }
    }
}

impl Default for BackoffLevel {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether cached quotes for the affected symbols must be dropped
///
/// Throttling and connectivity failures mean the cache can no longer be
/// refreshed, so it is invalidated. A malformed response says nothing about
/// the other symbols' cached data.
pub fn should_invalidate_on_failure(class: ErrorClass) -> bool {
    matches!(class, ErrorClass::RateLimit | ErrorClass::Network)
}

/// Whether a failure of this class halts the governor instead of backing off
pub fn is_fatal(class: ErrorClass) -> bool {
    matches!(class, ErrorClass::Configuration)
}

/// Whether `tier` is due on tick `tick`
///
/// Tier 1 is due every tick; tier 2 and tier 3 every `tier2_every` and
/// `tier3_every` ticks (a multiplier of 0 is treated as 1).
pub fn tier_due(tier: Tier, tick: u64, tier2_every: u64, tier3_every: u64) -> bool {
    let every = match tier {
        Tier::One => 1,
        Tier::Two => tier2_every.max(1),
        Tier::Three => tier3_every.max(1),
    };
    tick % every == 0
}

/// Deduplicated symbols due this tick, in roster order
pub fn due_symbols(
    active: &[ActiveSymbol],
    tick: u64,
    tier2_every: u64,
    tier3_every: u64,
) -> Vec<String> {
    let mut seen = HashSet::new();
    active
        .iter()
        .filter(|a| tier_due(a.tier, tick, tier2_every, tier3_every))
        .filter(|a| seen.insert(a.symbol.as_str()))
        .map(|a| a.symbol.clone())
        .collect()
}

/// Split symbols into fixed-size batches (the last may be short)
pub fn plan_batches(symbols: &[String], batch_size: usize) -> Vec<Vec<String>> {
    symbols
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
