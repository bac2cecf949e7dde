//! Rate budget module
//!
//! Caps outbound data-provider calls per minute with a token bucket that
//! refills in full on a fixed period.

mod budget;

pub use budget::{RateBudget, RateBudgetSnapshot};
