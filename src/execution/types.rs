//! Execution types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill at the current quote
    Market,
    /// Fill at the order price
    Limit,
}

/// An order to be submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Strategy or symbol key whose stage gates this order
    pub key: String,
    pub symbol: String,
    pub side: Side,
    /// Limit price; ignored for market orders
    pub price: Decimal,
    /// Whole shares
    pub quantity: Decimal,
    pub order_type: OrderType,
}

/// A fill (executed trade)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub key: String,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Fees paid
    pub fees: Decimal,
}

impl Fill {
    /// Price x quantity
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}
