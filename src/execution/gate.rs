//! Stale-quote and stage gate in front of an execution engine

use super::{ExecutionEngine, Order, OrderId};
use crate::governor::QuoteCache;
use crate::provider::Quote;
use crate::stage::{Stage, StageManager};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Why an order was refused
#[derive(Debug, Error)]
pub enum ExecutionGateError {
    /// No cached quote, typically after a stale-data invalidation
    #[error("No cached quote for {0}")]
    NoQuote(String),
    #[error("Quote for {symbol} is {age_secs}s old (max {max_secs}s)")]
    StaleQuote {
        symbol: String,
        age_secs: i64,
        max_secs: i64,
    },
    #[error("Key {key} is at stage {stage:?}, orders require ROUTE")]
    NotRouted { key: String, stage: Option<Stage> },
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

/// Refuses orders on stale data or for keys not yet at ROUTE
pub struct ExecutionGate {
    quotes: QuoteCache,
    stages: Arc<StageManager>,
    engine: Arc<dyn ExecutionEngine>,
    max_quote_age: Duration,
}

impl ExecutionGate {
    pub fn new(
        quotes: QuoteCache,
        stages: Arc<StageManager>,
        engine: Arc<dyn ExecutionEngine>,
        max_quote_age: Duration,
    ) -> Self {
        Self {
            quotes,
            stages,
            engine,
            max_quote_age,
        }
    }

    /// Check an order against the gate as of `now`, returning the quote it relies on
    pub fn check(&self, order: &Order, now: DateTime<Utc>) -> Result<Quote, ExecutionGateError> {
        let stage = self.stages.stage_of(&order.key);
        if stage != Some(Stage::Route) {
            return Err(ExecutionGateError::NotRouted {
                key: order.key.clone(),
                stage,
            });
        }

        let quote = self
            .quotes
            .get(&order.symbol)
            .ok_or_else(|| ExecutionGateError::NoQuote(order.symbol.clone()))?;

        let age = quote.age(now);
        if age > self.max_quote_age {
            return Err(ExecutionGateError::StaleQuote {
                symbol: order.symbol.clone(),
                age_secs: age.num_seconds(),
                max_secs: self.max_quote_age.num_seconds(),
            });
        }

        Ok(quote)
    }

    /// Check then submit
    pub async fn submit(&self, order: Order) -> Result<OrderId, ExecutionGateError> {
        if let Err(e) = self.check(&order, Utc::now()) {
            tracing::warn!(key = %order.key, symbol = %order.symbol, error = %e, "Order refused");
            return Err(e);
        }
        Ok(self.engine.submit_order(order).await?)
    }
}
