//! Symbol roster module
//!
//! Holds the tiered symbol list the governor polls. The list is replaced
//! wholesale by an out-of-band refresh; readers take a snapshot per tick.

mod types;

pub use types::{ActiveSymbol, RosterEntry, Tier};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// Trait for roster backends
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Load the full current roster
    async fn load(&self) -> anyhow::Result<Vec<RosterEntry>>;
}

/// Roster source backed by a fixed list (typically from configuration)
pub struct StaticRosterSource {
    entries: Vec<RosterEntry>,
}

impl StaticRosterSource {
    pub fn new(entries: Vec<RosterEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl RosterSource for StaticRosterSource {
    async fn load(&self) -> anyhow::Result<Vec<RosterEntry>> {
        Ok(self.entries.clone())
    }
}

/// Shared, snapshot-readable roster
pub struct SymbolRoster {
    entries: Arc<RwLock<Vec<RosterEntry>>>,
    max_symbols: usize,
    max_symbols_after_hours: Option<usize>,
    refreshed_at: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl SymbolRoster {
    /// Create a roster with a selection cap
    pub fn new(max_symbols: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(vec![])),
            max_symbols,
            max_symbols_after_hours: None,
            refreshed_at: Arc::new(RwLock::new(None)),
        }
    }

    /// Use a different cap while the market is closed
    pub fn with_after_hours_cap(mut self, cap: Option<usize>) -> Self {
        self.max_symbols_after_hours = cap;
        self
    }

    /// Replace the roster contents
    pub async fn replace(&self, entries: Vec<RosterEntry>) {
        let count = entries.len();
        *self.entries.write().await = entries;
        *self.refreshed_at.write().await = Some(Utc::now());
        tracing::debug!(count, "Roster replaced");
    }

    /// Reload from a source; on error the previous snapshot is kept
    pub async fn refresh(&self, source: &dyn RosterSource) -> anyhow::Result<usize> {
        let entries = source.load().await?;
        let count = entries.len();
        self.replace(entries).await;
        Ok(count)
    }

    /// Copy of every entry, unfiltered
    pub async fn entries(&self) -> Vec<RosterEntry> {
        self.entries.read().await.clone()
    }

    /// When the roster was last replaced
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self.refreshed_at.read().await
    }

    /// Cap in force for the given market state
    pub fn cap(&self, market_open: bool) -> usize {
        if market_open {
            self.max_symbols
        } else {
            self.max_symbols_after_hours.unwrap_or(self.max_symbols)
        }
    }

    /// Ordered active roster: pinned, then tier1, tier2, tier3, capped
    pub async fn active_roster(&self, now: DateTime<Utc>, market_open: bool) -> Vec<ActiveSymbol> {
        if let Some(refreshed) = self.refreshed_at().await {
            tracing::trace!(age_secs = (now - refreshed).num_seconds(), "Roster snapshot age");
        }
        let entries = self.entries.read().await;
        select_active(&entries, self.cap(market_open))
    }

    /// Spawn a task that reloads the roster from `source` on an interval
    pub fn spawn_refresh_task(
        self: &Arc<Self>,
        source: Arc<dyn RosterSource>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let roster = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match roster.refresh(source.as_ref()).await {
                            Ok(count) => tracing::debug!(count, "Roster refreshed"),
                            Err(e) => tracing::warn!(error = %e, "Roster refresh failed, keeping previous snapshot"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

/// Pure selection over a roster snapshot
///
/// Pinned symbols come first, then tiers in priority order; each group is
/// ranked by descending score. A symbol listed more than once keeps its
/// highest-priority slot. The result is truncated at `cap`.
pub fn select_active(entries: &[RosterEntry], cap: usize) -> Vec<ActiveSymbol> {
    let mut ranked: Vec<&RosterEntry> = entries.iter().collect();
    ranked.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then(a.tier.cmp(&b.tier))
            .then(b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then(a.symbol.cmp(&b.symbol))
    });

    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|e| seen.insert(e.symbol.as_str()))
        .take(cap)
        .map(|e| ActiveSymbol {
            symbol: e.symbol.clone(),
            tier: e.tier,
        })
        .collect()
}
