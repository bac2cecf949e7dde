//! Fitness inputs and results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Traditional backtest performance metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: u32,
    pub sharpe_ratio: f64,
    /// Total return as a fraction (0.25 = 25%)
    pub total_return: f64,
    /// Maximum drawdown as a fraction
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    /// Periodic return series, used for correlation against peers
    #[serde(default)]
    pub returns: Vec<f64>,
}

/// Execution-realism metrics for a strategy run with real capital limits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapitalMetrics {
    /// Net P&L after friction
    pub net_pnl: f64,
    /// P&L before slippage and commission
    pub gross_pnl: f64,
    /// Average capital placed at risk
    pub capital_at_risk: f64,
    pub total_slippage: f64,
    pub total_commission: f64,
    /// Average slippage per fill as a fraction of price
    pub avg_slippage_pct: f64,
    /// Average fraction of ADV consumed by orders
    pub adv_participation: f64,
    /// Fraction of intended notional lost to whole-share rounding
    pub rounding_inefficiency: f64,
}

impl CapitalMetrics {
    /// Net P&L per dollar risked; zero when nothing was at risk
    pub fn capital_efficiency(&self) -> f64 {
        if self.capital_at_risk > 0.0 && self.net_pnl.is_finite() {
            self.net_pnl / self.capital_at_risk
        } else {
            0.0
        }
    }

    /// Slippage plus commission as a fraction of absolute gross P&L
    ///
    /// Friction against zero gross P&L is reported as infinite.
    pub fn friction_ratio(&self) -> f64 {
        let friction = self.total_slippage.abs() + self.total_commission.abs();
        if friction == 0.0 {
            0.0
        } else if self.gross_pnl == 0.0 {
            f64::INFINITY
        } else {
            friction / self.gross_pnl.abs()
        }
    }
}

/// Itemized contributions to the enhanced fitness
///
/// Bonuses are added and penalties subtracted; every value is non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    pub capital_efficiency_bonus: f64,
    pub diversification_bonus: f64,
    pub slippage_penalty: f64,
    pub market_impact_penalty: f64,
    pub rounding_penalty: f64,
    pub capital_floor_penalty: f64,
    pub friction_cap_penalty: f64,
}

impl FitnessBreakdown {
    /// Sum of bonuses minus sum of penalties
    pub fn net_adjustment(&self) -> f64 {
        self.capital_efficiency_bonus + self.diversification_bonus
            - self.slippage_penalty
            - self.market_impact_penalty
            - self.rounding_penalty
            - self.capital_floor_penalty
            - self.friction_cap_penalty
    }
}

/// Result of one enhanced fitness evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessResult {
    pub base_fitness: f64,
    pub capital_efficiency: f64,
    pub breakdown: FitnessBreakdown,
    pub enhanced_fitness: f64,
}

/// A failed promotion check, carrying the observed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", content = "value", rename_all = "snake_case")]
pub enum PromotionFailure {
    TooFewTrades(u32),
    SharpeTooLow(f64),
    DrawdownTooHigh(f64),
    WinRateTooLow(f64),
    CapitalEfficiencyTooLow(f64),
    SlippageTooHigh(f64),
}

impl fmt::Display for PromotionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewTrades(n) => write!(f, "Insufficient trades: {}", n),
            Self::SharpeTooLow(v) => write!(f, "Sharpe ratio too low: {:.2}", v),
            Self::DrawdownTooHigh(v) => write!(f, "Max drawdown too high: {:.1}%", v * 100.0),
            Self::WinRateTooLow(v) => write!(f, "Win rate too low: {:.1}%", v * 100.0),
            Self::CapitalEfficiencyTooLow(v) => write!(f, "Capital efficiency too low: {:.3}", v),
            Self::SlippageTooHigh(v) => write!(f, "Slippage too high: {:.2}%", v * 100.0),
        }
    }
}

/// Promotion gate verdict with every failed check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionVerdict {
    pub eligible: bool,
    pub reasons: Vec<PromotionFailure>,
}
