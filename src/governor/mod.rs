//! Market-data refresh governor
//!
//! Decides which symbols to poll, how often and within what rate budget,
//! backs off under provider errors and signals staleness to consumers.

mod cache;
mod policy;
mod refresh;
mod types;

pub use cache::QuoteCache;
pub use policy::{
    due_symbols, is_fatal, plan_batches, should_invalidate_on_failure, tier_due, BackoffLevel, Health,
    MAX_BACKOFF, MIN_BACKOFF,
};
pub use refresh::RefreshGovernor;
pub use types::{GovernorEvent, GovernorStatus, TickReport, TierCounts};
