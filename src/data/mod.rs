//! Market data recording
//!
//! Hook invoked after every successful quote refresh so an external
//! auditing system can persist raw observations, plus a Parquet-backed
//! implementation of that hook.

mod parquet;
mod recorder;

pub use parquet::{observation_schema, ParquetReader, ParquetWriter};
pub use recorder::{ParquetRecorder, RecorderConfig, RecorderStats};

use crate::provider::Quote;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw quote observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteObservation {
    pub symbol: String,
    pub quote: Quote,
    pub ts_feed: DateTime<Utc>,
    pub ts_recv: DateTime<Utc>,
    /// Provider name
    pub source: String,
}

impl QuoteObservation {
    /// Build an observation from a quote and the provider it came from
    pub fn new(quote: Quote, source: impl Into<String>) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            ts_feed: quote.feed_ts,
            ts_recv: quote.received_at,
            quote,
            source: source.into(),
        }
    }
}

/// Trait for observation sinks
///
/// Errors are logged by the caller and never fail the refresh.
#[async_trait]
pub trait MarketRecorder: Send + Sync {
    /// Persist one observation
    async fn record(&self, observation: QuoteObservation) -> anyhow::Result<()>;
}
