//! Strategy fitness scoring
//!
//! Continuous composite score with an itemized breakdown, and a strict
//! promotion gate that is independent of the score.

mod criteria;
mod enhancer;
mod types;

pub use criteria::evaluate_promotion;
pub use enhancer::{correlation, FitnessEnhancer};
pub use types::{
    CapitalMetrics, FitnessBreakdown, FitnessResult, PerformanceMetrics, PromotionFailure,
    PromotionVerdict,
};
