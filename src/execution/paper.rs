//! Paper trading execution engine

use super::{ExecutionEngine, Fill, Order, OrderId, OrderType};
use crate::governor::QuoteCache;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Paper trading execution engine with simulated immediate fills
///
/// Limit orders fill at their price. Market orders fill at the cached
/// quote mid and are rejected when there is none.
pub struct PaperEngine {
    fee_rate: Decimal,
    quotes: Option<QuoteCache>,
    fills: Arc<RwLock<Vec<Fill>>>,
}

impl PaperEngine {
    /// Create a new paper trading engine
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            fee_rate,
            quotes: None,
            fills: Arc::new(RwLock::new(vec![])),
        }
    }

    /// Price market orders off the governor's quote cache
    pub fn with_quotes(mut self, quotes: QuoteCache) -> Self {
        self.quotes = Some(quotes);
        self
    }
}

#[async_trait]
impl ExecutionEngine for PaperEngine {
    async fn submit_order(&self, order: Order) -> anyhow::Result<OrderId> {
        if order.quantity <= Decimal::ZERO {
            anyhow::bail!("Order quantity must be positive: {}", order.quantity);
        }

        let price = match order.order_type {
            OrderType::Limit => order.price,
            OrderType::Market => self
                .quotes
                .as_ref()
                .and_then(|q| q.get(&order.symbol))
                .map(|q| q.mid())
                .ok_or_else(|| anyhow::anyhow!("No quote to fill market order for {}", order.symbol))?,
        };

        let order_id = OrderId::new_v4();
        let fees = order.quantity * price * self.fee_rate;
        let fill = Fill {
            order_id,
            key: order.key,
            symbol: order.symbol,
            side: order.side,
            price,
            quantity: order.quantity,
            timestamp: Utc::now(),
            fees,
        };

        tracing::info!(?order_id, symbol = %fill.symbol, side = ?fill.side, %price, "Paper order filled");
        self.fills.write().await.push(fill);
        Ok(order_id)
    }

    async fn cancel_order(&self, id: OrderId) -> anyhow::Result<()> {
        let fills = self.fills.read().await;
        if fills.iter().any(|f| f.order_id == id) {
            anyhow::bail!("Order {} already filled", id);
        }
        anyhow::bail!("Unknown order {}", id)
    }

    async fn get_fills(&self) -> anyhow::Result<Vec<Fill>> {
        let fills = self.fills.read().await;
        Ok(fills.clone())
    }
}
