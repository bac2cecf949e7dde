//! Roster types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Polling priority bucket (1 = highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Refreshed every tick
    One,
    /// Refreshed every `tier2_every` ticks
    Two,
    /// Refreshed every `tier3_every` ticks
    Three,
}

impl Tier {
    /// All tiers in priority order
    pub const ALL: [Tier; 3] = [Tier::One, Tier::Two, Tier::Three];

    /// Numeric tier
    pub fn as_u8(self) -> u8 {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::One),
            2 => Ok(Tier::Two),
            3 => Ok(Tier::Three),
            other => Err(format!("tier must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.as_u8()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.as_u8())
    }
}

/// One symbol in the roster, as supplied by the roster source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Ticker symbol
    pub symbol: String,
    /// Priority tier
    pub tier: Tier,
    /// Pinned symbols are always selected first
    #[serde(default)]
    pub pinned: bool,
    /// Last score, used to rank within a tier
    #[serde(default)]
    pub score: f64,
}

impl RosterEntry {
    /// Create an unpinned entry
    pub fn new(symbol: impl Into<String>, tier: Tier, score: f64) -> Self {
        Self {
            symbol: symbol.into(),
            tier,
            pinned: false,
            score,
        }
    }

    /// Mark the entry as pinned
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// A selected symbol with the tier it is polled at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveSymbol {
    pub symbol: String,
    pub tier: Tier,
}
