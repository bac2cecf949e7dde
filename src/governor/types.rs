//! Governor events and status types

use super::policy::{BackoffLevel, Health};
use crate::provider::ErrorClass;
use crate::rate::RateBudgetSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events published by the refresh loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GovernorEvent {
    /// A batch of quotes was merged into the cache
    QuotesUpdated {
        tick: u64,
        symbols: Vec<String>,
        received_at: DateTime<Utc>,
    },
    /// A provider call failed and the backoff level was raised
    Backoff {
        tick: u64,
        reason: String,
        class: ErrorClass,
        level: u32,
        symbols: Vec<String>,
        /// Whether cached data for `symbols` must be treated as stale
        invalidate: bool,
    },
    /// Cached quotes were dropped; consumers must not trade on them
    StaleDataAlert {
        tick: u64,
        symbols: Vec<String>,
        class: ErrorClass,
        invalidated: usize,
        at: DateTime<Utc>,
    },
    /// Unrecoverable provider failure; the loop has stopped polling
    Halted {
        tick: u64,
        reason: String,
        at: DateTime<Utc>,
    },
}

/// Active-roster counts per tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub tier1: usize,
    pub tier2: usize,
    pub tier3: usize,
    pub pinned: usize,
}

/// Answer to a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorStatus {
    pub provider: String,
    pub autorefresh: bool,
    pub running: bool,
    /// Current sleep between ticks (base interval x backoff)
    pub interval_ms: u64,
    pub backoff_level: u32,
    pub health: Health,
    pub rate_budget: RateBudgetSnapshot,
    pub batch_size: usize,
    pub symbols_cached: usize,
    pub tiers: TierCounts,
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub market_open: bool,
    pub tick: u64,
    /// Set once a configuration failure stopped polling
    #[serde(default)]
    pub halted: bool,
}

/// Mutable loop state; written only by the refresh loop
#[derive(Debug, Clone, Default)]
pub(crate) struct GovernorState {
    pub backoff: BackoffLevel,
    pub tick: u64,
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub market_open: bool,
    pub halted: bool,
}

/// Summary of one tick, for callers driving ticks by hand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub market_open: bool,
    pub due_symbols: usize,
    pub batches_planned: usize,
    pub batches_sent: usize,
    pub batches_deferred: usize,
    pub batches_failed: usize,
    pub quotes_merged: usize,
    /// Tick stopped early because shutdown was requested
    pub interrupted: bool,
    /// Governor is halted on a configuration failure
    pub halted: bool,
}
