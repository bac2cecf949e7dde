//! Options chain quality analysis
//!
//! Pure scoring of spread, volume and open interest for a chain snapshot,
//! plus a validation gate that reports every failed minimum.

mod analyzer;
mod types;

pub use analyzer::ChainAnalyzer;
pub use types::{
    ChainIssue, ChainQuality, ChainValidation, OptionContract, OptionKind, OptionsChain,
};

pub(crate) use analyzer::ladder_score;
