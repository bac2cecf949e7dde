//! Chain liquidity scoring

use super::types::{ChainIssue, ChainQuality, ChainValidation, OptionsChain};
use crate::config::ChainConfig;

const SPREAD_WEIGHT: f64 = 0.4;
const VOLUME_WEIGHT: f64 = 0.35;
const OI_WEIGHT: f64 = 0.25;

/// Average daily volume ladder: (minimum, score)
const VOLUME_LADDER: [(f64, f64); 5] = [
    (1000.0, 1.0),
    (500.0, 0.8),
    (100.0, 0.6),
    (50.0, 0.4),
    (10.0, 0.2),
];

/// Average open interest ladder: (minimum, score)
const OI_LADDER: [(f64, f64); 5] = [
    (5000.0, 1.0),
    (1000.0, 0.8),
    (500.0, 0.6),
    (100.0, 0.4),
    (10.0, 0.2),
];

/// First rung whose minimum `value` reaches, else 0
pub(crate) fn ladder_score(value: f64, ladder: &[(f64, f64)]) -> f64 {
    ladder
        .iter()
        .find(|(min, _)| value >= *min)
        .map(|(_, score)| *score)
        .unwrap_or(0.0)
}

/// Scores and validates options chain liquidity
#[derive(Debug, Clone)]
pub struct ChainAnalyzer {
    config: ChainConfig,
}

impl Default for ChainAnalyzer {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl ChainAnalyzer {
    pub fn new(config: ChainConfig) -> Self {
        Self { config }
    }

    /// Score a chain snapshot
    ///
    /// Contracts without a usable bid count as the widest possible spread.
    /// An empty chain scores zero everywhere.
    pub fn analyze(&self, chain: &OptionsChain) -> ChainQuality {
        let n = chain.contracts.len();
        if n == 0 {
            return ChainQuality {
                spread_score: 0.0,
                volume_score: 0.0,
                oi_score: 0.0,
                overall: 0.0,
                avg_spread: 0.0,
                avg_volume: 0.0,
                avg_open_interest: 0.0,
                contracts: 0,
            };
        }

        let max_spread = self.config.max_spread.max(f64::EPSILON);
        let spread_sum: f64 = chain
            .contracts
            .iter()
            .map(|c| c.relative_spread().unwrap_or(max_spread))
            .sum();
        let avg_spread = spread_sum / n as f64;
        let avg_volume = chain.contracts.iter().map(|c| c.volume as f64).sum::<f64>() / n as f64;
        let avg_open_interest =
            chain.contracts.iter().map(|c| c.open_interest as f64).sum::<f64>() / n as f64;

        let spread_score = 1.0 - (avg_spread / max_spread).min(1.0);
        let volume_score = ladder_score(avg_volume, &VOLUME_LADDER);
        let oi_score = ladder_score(avg_open_interest, &OI_LADDER);
        let overall = SPREAD_WEIGHT * spread_score + VOLUME_WEIGHT * volume_score + OI_WEIGHT * oi_score;

        ChainQuality {
            spread_score,
            volume_score,
            oi_score,
            overall,
            avg_spread,
            avg_volume,
            avg_open_interest,
            contracts: n,
        }
    }

    /// Check a chain against the configured minimums
    ///
    /// Every violated minimum is reported, not only the first.
    pub fn validate(&self, chain: &OptionsChain) -> ChainValidation {
        let quality = self.analyze(chain);
        let mut reasons = Vec::new();

        if quality.contracts == 0 {
            reasons.push(ChainIssue::EmptyChain);
        }
        if quality.spread_score < self.config.min_spread_score {
            reasons.push(ChainIssue::SpreadTooWide(quality.spread_score));
        }
        if quality.volume_score < self.config.min_volume_score {
            reasons.push(ChainIssue::VolumeTooLow(quality.volume_score));
        }
        if quality.oi_score < self.config.min_oi_score {
            reasons.push(ChainIssue::OpenInterestTooLow(quality.oi_score));
        }
        if quality.overall < self.config.min_overall_score {
            reasons.push(ChainIssue::OverallTooLow(quality.overall));
        }

        if !reasons.is_empty() {
            tracing::debug!(
                underlying = %chain.underlying,
                overall = quality.overall,
                issues = reasons.len(),
                "Chain failed validation"
            );
        }

        ChainValidation {
            valid: reasons.is_empty(),
            reasons,
            quality,
        }
    }
}
