//! Quote provider types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latest quote for one symbol
///
/// Ephemeral: each refresh overwrites the previous value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol
    pub symbol: String,
    /// Last trade price
    pub last: Decimal,
    /// Best bid
    pub bid: Decimal,
    /// Best ask
    pub ask: Decimal,
    /// Session volume
    pub volume: u64,
    /// Provider (feed) timestamp
    pub feed_ts: DateTime<Utc>,
    /// Local receipt timestamp
    pub received_at: DateTime<Utc>,
}

impl Quote {
    /// Sanity check: positive last, non-negative sides, uncrossed book
    pub fn is_valid(&self) -> bool {
        if self.last <= Decimal::ZERO || self.bid < Decimal::ZERO || self.ask < Decimal::ZERO {
            return false;
        }
        !(self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.bid > self.ask)
    }

    /// Mid price, falling back to last when either side is missing
    pub fn mid(&self) -> Decimal {
        if self.bid > Decimal::ZERO && self.ask > Decimal::ZERO {
            (self.bid + self.ask) / Decimal::TWO
        } else {
            self.last
        }
    }

    /// Age of the quote relative to `now`, measured from receipt
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.received_at
    }
}

/// Failure class used for backoff and cache-invalidation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Provider throttled us
    RateLimit,
    /// Connectivity failure or timeout
    Network,
    /// Response failed validation
    Malformed,
    /// Credentials or setup are wrong; retrying will not help
    Configuration,
    /// Anything else
    Other,
}

impl ErrorClass {
    /// Metric/log label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::RateLimit => "rate_limit",
            ErrorClass::Network => "network",
            ErrorClass::Malformed => "malformed",
            ErrorClass::Configuration => "configuration",
            ErrorClass::Other => "other",
        }
    }
}

/// Quote provider errors
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider signalled throttling
    #[error("Rate limited by provider{}", .retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },
    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),
    /// Call exceeded the hard timeout
    #[error("Provider call timed out after {0}ms")]
    Timeout(u64),
    /// Response could not be decoded or failed validation
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// Provider is misconfigured (e.g. missing credentials)
    #[error("Provider configuration error: {0}")]
    Configuration(String),
    /// Unclassified provider failure
    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Classify for backoff / invalidation policy
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::RateLimited { .. } => ErrorClass::RateLimit,
            ProviderError::Network(_) | ProviderError::Timeout(_) => ErrorClass::Network,
            ProviderError::Malformed(_) => ErrorClass::Malformed,
            ProviderError::Configuration(_) => ErrorClass::Configuration,
            ProviderError::Other(_) => ErrorClass::Other,
        }
    }
}
