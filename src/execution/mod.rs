//! Execution engine module
//!
//! Order submission interfaces, a paper engine, and the gate that keeps
//! orders off stale quotes and un-promoted strategies.

mod gate;
mod paper;
mod types;

pub use gate::{ExecutionGate, ExecutionGateError};
pub use paper::PaperEngine;
pub use types::{Fill, Order, OrderId, OrderType, Side};

use async_trait::async_trait;

/// Trait for execution engine implementations
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Submit an order
    async fn submit_order(&self, order: Order) -> anyhow::Result<OrderId>;
    /// Cancel an order
    async fn cancel_order(&self, id: OrderId) -> anyhow::Result<()>;
    /// Get all fills
    async fn get_fills(&self) -> anyhow::Result<Vec<Fill>>;
}
