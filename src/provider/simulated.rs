//! Deterministic simulated provider for paper runs and tests

use super::{ProviderError, Quote, QuoteProvider};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// Random-walk quote source with scripted failures
///
/// Prices start from a value derived from the symbol and move by at most
/// 0.5% per call. The walk is seeded, so two providers with the same seed
/// produce the same sequence.
pub struct SimulatedProvider {
    name: String,
    latency: Duration,
    state: Mutex<SimState>,
}

struct SimState {
    rng: StdRng,
    prices: HashMap<String, Decimal>,
    failures: VecDeque<ProviderError>,
    missing: HashSet<String>,
    calls: u64,
}

impl SimulatedProvider {
    /// Create a provider with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            name: "simulated".to_string(),
            latency: Duration::ZERO,
            state: Mutex::new(SimState {
                rng: StdRng::seed_from_u64(seed),
                prices: HashMap::new(),
                failures: VecDeque::new(),
                missing: HashSet::new(),
                calls: 0,
            }),
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next call fail with `error`; failures queue in order
    pub fn push_failure(&self, error: ProviderError) {
        self.state.lock().failures.push_back(error);
    }

    /// Never return quotes for these symbols
    pub fn set_missing<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().missing = symbols.into_iter().map(Into::into).collect();
    }

    /// Number of `get_quotes` calls made so far
    pub fn calls(&self) -> u64 {
        self.state.lock().calls
    }
}

/// Starting price in [50, 500) derived from the symbol bytes
fn seed_price(symbol: &str) -> Decimal {
    let sum: u64 = symbol
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    Decimal::from(50 + sum % 450)
}

#[async_trait]
impl QuoteProvider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock();
        state.calls += 1;
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }

        let now = Utc::now();
        let mut quotes = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            if state.missing.contains(symbol) {
                continue;
            }
            // Step in basis points, within [-50, 50]
            let step = Decimal::new(state.rng.gen_range(-50..=50), 4);
            let price = state
                .prices
                .entry(symbol.clone())
                .or_insert_with(|| seed_price(symbol));
            *price = (*price * (Decimal::ONE + step)).round_dp(2).max(dec!(0.01));
            let last = *price;
            let half_spread = (last * dec!(0.0005)).round_dp(2).max(dec!(0.01));
            let volume = state.rng.gen_range(1_000..51_000);

            quotes.insert(
                symbol.clone(),
                Quote {
                    symbol: symbol.clone(),
                    last,
                    bid: last - half_spread,
                    ask: last + half_spread,
                    volume,
                    feed_ts: now,
                    received_at: now,
                },
            );
        }
        Ok(quotes)
    }
}
