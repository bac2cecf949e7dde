//! market-governor: market-data refresh governor and strategy staging
//!
//! This library provides the core components for:
//! - Per-minute rate budget for the quote provider
//! - Market-hours calendar and tiered symbol roster
//! - Quote provider adapters (HTTP and simulated)
//! - Refresh governor with backoff and stale-data signaling
//! - Options chain liquidity scoring
//! - Strategy fitness scoring with capital-realism penalties
//! - Hysteresis stage manager
//! - Stale-quote execution gate and paper engine
//! - Quote observation capture to Parquet
//! - Logging and metrics

pub mod calendar;
pub mod chain;
pub mod cli;
pub mod config;
pub mod data;
pub mod execution;
pub mod fitness;
pub mod governor;
pub mod provider;
pub mod rate;
pub mod roster;
pub mod stage;
pub mod telemetry;
