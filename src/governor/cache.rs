//! Shared quote cache
//!
//! Written only by the refresh loop, read by anyone. Reads copy out so no
//! reader holds the lock while it works with a quote.

use crate::provider::Quote;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Latest-quote cache keyed by symbol (last write wins)
#[derive(Clone, Default)]
pub struct QuoteCache {
    inner: Arc<RwLock<HashMap<String, Quote>>>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the cached quote for `symbol`
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.inner.read().get(symbol).cloned()
    }

    /// Copy of the whole cache
    pub fn snapshot(&self) -> HashMap<String, Quote> {
        self.inner.read().clone()
    }

    /// Insert or overwrite quotes
    pub fn merge<I>(&self, quotes: I)
    where
        I: IntoIterator<Item = Quote>,
    {
        let mut map = self.inner.write();
        for quote in quotes {
            map.insert(quote.symbol.clone(), quote);
        }
    }

    /// Drop cached quotes for `symbols`; returns how many were present
    pub fn invalidate(&self, symbols: &[String]) -> usize {
        let mut map = self.inner.write();
        symbols.iter().filter(|s| map.remove(s.as_str()).is_some()).count()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.inner.read().contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
