//! Quote provider module
//!
//! Adapters that fetch quotes for a batch of symbols. The governor only
//! sees the `QuoteProvider` trait; failures come back classified.

mod http;
mod simulated;
mod types;

pub use http::{HttpProviderConfig, HttpQuoteProvider};
pub use simulated::SimulatedProvider;
pub use types::{ErrorClass, ProviderError, Quote};

use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for quote provider implementations
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider name, reported in status and recorder observations
    fn name(&self) -> &str;
    /// Fetch the latest quotes for `symbols`
    async fn get_quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, ProviderError>;
}
