//! Promotion gate

use super::types::{CapitalMetrics, PerformanceMetrics, PromotionFailure, PromotionVerdict};
use crate::config::PromotionCriteria;

// NaN never passes a check
fn below(value: f64, min: f64) -> bool {
    value.is_nan() || value < min
}

fn above(value: f64, max: f64) -> bool {
    value.is_nan() || value > max
}

/// Evaluate every check; nothing short-circuits
pub fn evaluate_promotion(
    criteria: &PromotionCriteria,
    metrics: &PerformanceMetrics,
    capital: &CapitalMetrics,
) -> PromotionVerdict {
    let mut reasons = Vec::new();

    if metrics.total_trades < criteria.min_trades {
        reasons.push(PromotionFailure::TooFewTrades(metrics.total_trades));
    }
    if below(metrics.sharpe_ratio, criteria.min_sharpe) {
        reasons.push(PromotionFailure::SharpeTooLow(metrics.sharpe_ratio));
    }
    if above(metrics.max_drawdown, criteria.max_drawdown) {
        reasons.push(PromotionFailure::DrawdownTooHigh(metrics.max_drawdown));
    }
    if below(metrics.win_rate, criteria.min_win_rate) {
        reasons.push(PromotionFailure::WinRateTooLow(metrics.win_rate));
    }
    let efficiency = capital.capital_efficiency();
    if below(efficiency, criteria.min_capital_efficiency) {
        reasons.push(PromotionFailure::CapitalEfficiencyTooLow(efficiency));
    }
    if above(capital.avg_slippage_pct, criteria.max_slippage_pct) {
        reasons.push(PromotionFailure::SlippageTooHigh(capital.avg_slippage_pct));
    }

    PromotionVerdict {
        eligible: reasons.is_empty(),
        reasons,
    }
}
