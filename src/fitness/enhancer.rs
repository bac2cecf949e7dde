//! Composite fitness scoring
//!
//! Base fitness rewards backtest performance. The enhanced score then
//! charges for what it would cost to run the strategy with real, limited
//! capital, so a strategy cannot rank highly on backtest numbers alone.

use super::criteria::evaluate_promotion;
use super::types::{CapitalMetrics, FitnessBreakdown, FitnessResult, PerformanceMetrics, PromotionVerdict};
use crate::chain::ladder_score;
use crate::config::FitnessConfig;

const SHARPE_CAP: f64 = 3.0;
const RISK_ADJUSTED_RETURN_CAP: f64 = 2.0;
const PROFIT_FACTOR_CAP: f64 = 3.0;

const SHARPE_WEIGHT: f64 = 0.4;
const RETURN_WEIGHT: f64 = 0.3;
const CONSISTENCY_WEIGHT: f64 = 0.3;

/// P&L per dollar risked -> bonus
const CAPITAL_EFFICIENCY_LADDER: [(f64, f64); 4] =
    [(0.5, 0.15), (0.25, 0.10), (0.10, 0.05), (0.05, 0.02)];
/// Average slippage fraction -> penalty
const SLIPPAGE_LADDER: [(f64, f64); 4] =
    [(0.005, 0.15), (0.0025, 0.10), (0.001, 0.05), (0.0005, 0.02)];
/// ADV participation -> penalty
const IMPACT_LADDER: [(f64, f64); 3] = [(0.10, 0.20), (0.05, 0.10), (0.01, 0.05)];
/// Rounding inefficiency -> penalty
const ROUNDING_LADDER: [(f64, f64); 3] = [(0.10, 0.10), (0.05, 0.05), (0.02, 0.02)];
/// Average absolute peer correlation, strictly below -> bonus
const DIVERSIFICATION_LADDER: [(f64, f64); 3] = [(0.3, 0.10), (0.5, 0.05), (0.7, 0.02)];

const CAPITAL_FLOOR_SCALE: f64 = 0.2;
const FRICTION_CAP_SCALE: f64 = 0.1;

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Pearson correlation over the overlapping prefix of two series
///
/// `None` when fewer than two points overlap or either side is flat.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Strategy fitness scorer
#[derive(Debug, Clone)]
pub struct FitnessEnhancer {
    config: FitnessConfig,
}

impl Default for FitnessEnhancer {
    fn default() -> Self {
        Self::new(FitnessConfig::default())
    }
}

impl FitnessEnhancer {
    pub fn new(config: FitnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Weighted performance score in [0, 1]
    ///
    /// Sharpe (capped at 3), drawdown-adjusted return (capped at 2) and
    /// win rate x profit factor (capped at 3) are each normalized to [0, 1]
    /// before weighting. Non-finite inputs count as zero.
    pub fn base_fitness(&self, metrics: &PerformanceMetrics) -> f64 {
        let sharpe = finite_or_zero(metrics.sharpe_ratio).clamp(0.0, SHARPE_CAP) / SHARPE_CAP;

        let drawdown = finite_or_zero(metrics.max_drawdown).clamp(0.0, 1.0);
        let risk_adjusted = (finite_or_zero(metrics.total_return) * (1.0 - drawdown))
            .clamp(0.0, RISK_ADJUSTED_RETURN_CAP)
            / RISK_ADJUSTED_RETURN_CAP;

        let win_rate = finite_or_zero(metrics.win_rate).clamp(0.0, 1.0);
        let profit_factor = finite_or_zero(metrics.profit_factor).clamp(0.0, PROFIT_FACTOR_CAP);
        let consistency = win_rate * profit_factor / PROFIT_FACTOR_CAP;

        SHARPE_WEIGHT * sharpe + RETURN_WEIGHT * risk_adjusted + CONSISTENCY_WEIGHT * consistency
    }

    /// Bonus for low average absolute correlation to peer return series
    ///
    /// Zero when no peers are supplied or no correlation can be computed.
    pub fn diversification_bonus(&self, returns: &[f64], peers: &[Vec<f64>]) -> f64 {
        let correlations: Vec<f64> = peers
            .iter()
            .filter_map(|peer| correlation(returns, peer))
            .map(f64::abs)
            .collect();
        if correlations.is_empty() {
            return 0.0;
        }
        let avg = correlations.iter().sum::<f64>() / correlations.len() as f64;
        DIVERSIFICATION_LADDER
            .iter()
            .find(|(max, _)| avg < *max)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0.0)
    }

    /// Base fitness plus capital-realism adjustments, itemized
    pub fn enhanced_fitness(
        &self,
        metrics: &PerformanceMetrics,
        capital: &CapitalMetrics,
        peers: &[Vec<f64>],
    ) -> FitnessResult {
        let base_fitness = self.base_fitness(metrics);
        let capital_efficiency = capital.capital_efficiency();
        let cap = self.config.max_violation_penalty.max(0.0);

        let capital_floor_penalty = {
            let floor = self.config.capital_efficiency_floor;
            if floor > 0.0 && capital_efficiency < floor {
                ((floor - capital_efficiency) / floor * CAPITAL_FLOOR_SCALE).min(cap)
            } else {
                0.0
            }
        };

        let friction_cap_penalty = {
            let limit = self.config.friction_cap;
            let ratio = capital.friction_ratio();
            if limit > 0.0 && ratio > limit {
                ((ratio - limit) / limit * FRICTION_CAP_SCALE).min(cap)
            } else {
                0.0
            }
        };

        let breakdown = FitnessBreakdown {
            capital_efficiency_bonus: ladder_score(capital_efficiency, &CAPITAL_EFFICIENCY_LADDER),
            diversification_bonus: self.diversification_bonus(&metrics.returns, peers),
            slippage_penalty: ladder_score(finite_or_zero(capital.avg_slippage_pct), &SLIPPAGE_LADDER),
            market_impact_penalty: ladder_score(finite_or_zero(capital.adv_participation), &IMPACT_LADDER),
            rounding_penalty: ladder_score(finite_or_zero(capital.rounding_inefficiency), &ROUNDING_LADDER),
            capital_floor_penalty,
            friction_cap_penalty,
        };

        let enhanced_fitness =
            (base_fitness + breakdown.net_adjustment()).max(self.config.min_enhanced_fitness);

        tracing::trace!(
            base = base_fitness,
            enhanced = enhanced_fitness,
            capital_efficiency,
            "Fitness evaluated"
        );

        FitnessResult {
            base_fitness,
            capital_efficiency,
            breakdown,
            enhanced_fitness,
        }
    }

    /// Strict promotion gate; every failed check is reported
    pub fn meets_promotion_criteria(
        &self,
        metrics: &PerformanceMetrics,
        capital: &CapitalMetrics,
    ) -> PromotionVerdict {
        evaluate_promotion(&self.config.promotion, metrics, capital)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong() -> PerformanceMetrics {
        PerformanceMetrics {
            total_trades: 120,
            sharpe_ratio: 1.5,
            total_return: 0.5,
            max_drawdown: 0.1,
            win_rate: 0.6,
            profit_factor: 2.0,
            returns: vec![],
        }
    }

    fn efficient() -> CapitalMetrics {
        CapitalMetrics {
            net_pnl: 300.0,
            gross_pnl: 340.0,
            capital_at_risk: 1000.0,
            total_slippage: 25.0,
            total_commission: 15.0,
            avg_slippage_pct: 0.0002,
            adv_participation: 0.001,
            rounding_inefficiency: 0.0,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_base_fitness_weights() {
        let f = FitnessEnhancer::default().base_fitness(&strong());
        // 0.4 * 0.5 + 0.3 * 0.225 + 0.3 * 0.4
        assert!(approx(f, 0.2 + 0.0675 + 0.12));
    }

    #[test]
    fn test_base_fitness_deterministic() {
        let enhancer = FitnessEnhancer::default();
        assert_eq!(enhancer.base_fitness(&strong()), enhancer.base_fitness(&strong()));
    }

    #[test]
    fn test_sharpe_capped() {
        let enhancer = FitnessEnhancer::default();
        let capped = PerformanceMetrics {
            sharpe_ratio: 3.0,
            ..strong()
        };
        let extreme = PerformanceMetrics {
            sharpe_ratio: 10.0,
            ..strong()
        };
        assert_eq!(enhancer.base_fitness(&capped), enhancer.base_fitness(&extreme));
    }

    #[test]
    fn test_base_fitness_bounded() {
        let enhancer = FitnessEnhancer::default();
        let best = PerformanceMetrics {
            total_trades: 1,
            sharpe_ratio: 50.0,
            total_return: 100.0,
            max_drawdown: 0.0,
            win_rate: 1.0,
            profit_factor: 100.0,
            returns: vec![],
        };
        assert!(approx(enhancer.base_fitness(&best), 1.0));

        let worst = PerformanceMetrics {
            sharpe_ratio: -4.0,
            total_return: -0.9,
            win_rate: f64::NAN,
            ..strong()
        };
        assert_eq!(enhancer.base_fitness(&worst), 0.0);
    }

    #[test]
    fn test_enhanced_efficient_strategy() {
        let enhancer = FitnessEnhancer::default();
        let result = enhancer.enhanced_fitness(&strong(), &efficient(), &[]);
        assert!(approx(result.capital_efficiency, 0.3));
        assert_eq!(result.breakdown.capital_efficiency_bonus, 0.10);
        assert_eq!(result.breakdown.slippage_penalty, 0.0);
        assert_eq!(result.breakdown.market_impact_penalty, 0.0);
        assert_eq!(result.breakdown.diversification_bonus, 0.0);
        assert_eq!(result.breakdown.capital_floor_penalty, 0.0);
        assert_eq!(result.breakdown.friction_cap_penalty, 0.0);
        assert!(approx(result.enhanced_fitness, result.base_fitness + 0.10));
    }

    #[test]
    fn test_execution_penalties_stack() {
        let enhancer = FitnessEnhancer::default();
        let costly = CapitalMetrics {
            avg_slippage_pct: 0.006,
            adv_participation: 0.07,
            rounding_inefficiency: 0.03,
            ..efficient()
        };
        let b = enhancer.enhanced_fitness(&strong(), &costly, &[]).breakdown;
        assert_eq!(b.slippage_penalty, 0.15);
        assert_eq!(b.market_impact_penalty, 0.10);
        assert_eq!(b.rounding_penalty, 0.02);
    }

    #[test]
    fn test_floor_and_friction_penalties_scale() {
        let enhancer = FitnessEnhancer::default();
        let poor = CapitalMetrics {
            net_pnl: 20.0,
            gross_pnl: 100.0,
            capital_at_risk: 1000.0,
            total_slippage: 45.0,
            total_commission: 15.0,
            ..Default::default()
        };
        let b = enhancer.enhanced_fitness(&strong(), &poor, &[]).breakdown;
        // efficiency 0.02 vs floor 0.05: 0.6 of the floor missed
        assert!(approx(b.capital_floor_penalty, 0.6 * 0.2));
        // friction 0.6 vs cap 0.3: violated by 100%
        assert!(approx(b.friction_cap_penalty, 0.1));
    }

    #[test]
    fn test_violation_penalties_clamped() {
        let enhancer = FitnessEnhancer::default();
        let awful = CapitalMetrics {
            net_pnl: -5000.0,
            gross_pnl: 0.0,
            capital_at_risk: 1000.0,
            total_commission: 50.0,
            avg_slippage_pct: 0.02,
            adv_participation: 0.5,
            rounding_inefficiency: 0.5,
            ..Default::default()
        };
        let worst = PerformanceMetrics {
            sharpe_ratio: -1.0,
            total_return: -0.5,
            win_rate: 0.0,
            ..strong()
        };
        let result = enhancer.enhanced_fitness(&worst, &awful, &[]);
        assert_eq!(result.breakdown.capital_floor_penalty, 0.5);
        assert_eq!(result.breakdown.friction_cap_penalty, 0.5);
        assert_eq!(result.enhanced_fitness, -1.0);
    }

    #[test]
    fn test_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert!(approx(correlation(&a, &[2.0, 4.0, 6.0, 8.0]).unwrap(), 1.0));
        assert!(approx(correlation(&a, &[4.0, 3.0, 2.0, 1.0]).unwrap(), -1.0));
        assert!(correlation(&a, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(correlation(&a, &[1.0]).is_none());
    }

    #[test]
    fn test_diversification_bonus() {
        let enhancer = FitnessEnhancer::default();
        let mine = vec![0.01, -0.02, 0.03, -0.01, 0.02, 0.0];
        // Uncorrelated peer
        let orthogonal = vec![0.01, 0.01, -0.01, -0.01, 0.01, 0.01];
        let clone = mine.clone();

        assert_eq!(enhancer.diversification_bonus(&mine, &[]), 0.0);
        assert_eq!(enhancer.diversification_bonus(&mine, &[clone.clone()]), 0.0);

        let r = correlation(&mine, &orthogonal).unwrap().abs();
        assert!(r < 0.3, "fixture correlation {r}");
        assert_eq!(enhancer.diversification_bonus(&mine, &[orthogonal]), 0.10);
    }

    #[test]
    fn test_enhanced_deterministic() {
        let enhancer = FitnessEnhancer::default();
        let peers = vec![vec![0.01, 0.02, -0.01]];
        let metrics = PerformanceMetrics {
            returns: vec![0.02, -0.01, 0.0],
            ..strong()
        };
        assert_eq!(
            enhancer.enhanced_fitness(&metrics, &efficient(), &peers),
            enhancer.enhanced_fitness(&metrics, &efficient(), &peers)
        );
    }
}
