//! Token bucket with unconditional periodic reset

use crate::telemetry::{set_gauge, GaugeMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Point-in-time view of the budget, for status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudgetSnapshot {
    /// Configured quota per reset period
    pub quota_per_minute: u32,
    /// Tokens left in the current period
    pub tokens_remaining: u32,
}

/// Per-minute call budget for the quote provider
///
/// The token count starts at the quota and is restored to the quota on
/// every reset. There is no carry-over and no partial accrual. Both the
/// reset task and consumers write the counter, so it sits behind a mutex.
pub struct RateBudget {
    quota: u32,
    reset_interval: Duration,
    tokens: Mutex<u32>,
}

impl RateBudget {
    /// Create a budget with the given quota and a 60 second reset period
    pub fn new(quota_per_minute: u32) -> Self {
        Self::with_reset_interval(quota_per_minute, Duration::from_secs(60))
    }

    /// Create a budget with a custom reset period
    pub fn with_reset_interval(quota_per_minute: u32, reset_interval: Duration) -> Self {
        Self {
            quota: quota_per_minute,
            reset_interval,
            tokens: Mutex::new(quota_per_minute),
        }
    }

    /// Take one token if any are left
    ///
    /// Never blocks. A `false` return means the caller must defer the work.
    pub fn try_consume(&self) -> bool {
        let mut tokens = self.tokens.lock();
        if *tokens > 0 {
            *tokens -= 1;
            set_gauge(GaugeMetric::RateTokens, *tokens as f64);
            true
        } else {
            false
        }
    }

    /// Restore the full quota
    pub fn reset(&self) {
        *self.tokens.lock() = self.quota;
        set_gauge(GaugeMetric::RateTokens, self.quota as f64);
    }

    /// Tokens left in the current period
    pub fn remaining(&self) -> u32 {
        *self.tokens.lock()
    }

    /// Configured quota
    pub fn quota(&self) -> u32 {
        self.quota
    }

    /// Reset period
    pub fn reset_interval(&self) -> Duration {
        self.reset_interval
    }

    /// Snapshot for status reporting
    pub fn snapshot(&self) -> RateBudgetSnapshot {
        RateBudgetSnapshot {
            quota_per_minute: self.quota,
            tokens_remaining: self.remaining(),
        }
    }

    /// Spawn the periodic reset task
    ///
    /// The task stops when `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn_reset_task(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let budget = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(budget.reset_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the bucket already starts full.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        budget.reset();
                        tracing::trace!(quota = budget.quota, "Rate budget reset");
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Rate budget reset task stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
