//! Options chain snapshot and analysis result types

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

/// One contract in a chain snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub kind: OptionKind,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub volume: u64,
    #[serde(default)]
    pub open_interest: u64,
}

impl OptionContract {
    /// Relative spread `(ask - bid) / bid`
    ///
    /// A contract with no bid has no usable market and reports `None`.
    pub fn relative_spread(&self) -> Option<f64> {
        if self.bid <= Decimal::ZERO || self.ask < self.bid {
            return None;
        }
        ((self.ask - self.bid) / self.bid).to_f64()
    }
}

/// Snapshot of an options chain for one underlying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsChain {
    pub underlying: String,
    pub contracts: Vec<OptionContract>,
}

/// Liquidity sub-scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainQuality {
    pub spread_score: f64,
    pub volume_score: f64,
    pub oi_score: f64,
    pub overall: f64,
    /// Inputs behind the scores
    pub avg_spread: f64,
    pub avg_volume: f64,
    pub avg_open_interest: f64,
    pub contracts: usize,
}

/// Reason a chain failed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "score", rename_all = "snake_case")]
pub enum ChainIssue {
    /// No contracts in the snapshot
    EmptyChain,
    SpreadTooWide(f64),
    VolumeTooLow(f64),
    OpenInterestTooLow(f64),
    OverallTooLow(f64),
}

impl fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChain => write!(f, "Chain has no contracts"),
            Self::SpreadTooWide(s) => write!(f, "Spread score {:.2} below minimum", s),
            Self::VolumeTooLow(s) => write!(f, "Volume score {:.2} below minimum", s),
            Self::OpenInterestTooLow(s) => write!(f, "Open interest score {:.2} below minimum", s),
            Self::OverallTooLow(s) => write!(f, "Overall score {:.2} below minimum", s),
        }
    }
}

/// Validation verdict with every violated minimum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainValidation {
    pub valid: bool,
    pub reasons: Vec<ChainIssue>,
    pub quality: ChainQuality,
}
