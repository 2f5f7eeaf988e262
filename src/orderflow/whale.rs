// =============================================================================
// Whale Tiers
// =============================================================================
//
// A "whale" is a single print whose notional reaches the S tier of its coin's
// market-cap class.  Three tiers, ascending:
//
//   S  >= small      M  >= medium      X  >= large
//
// Thresholds shrink with market cap: a 300k print is noise on BTC but a
// decisive event on a micro cap.  Defaults (USD notional):
//
//   HIGH            500k / 1M   / 1.5M
//   MID             200k / 400k / 800k
//   LOW             100k / 200k / 400k
//   MICRO, UNKNOWN   80k / 150k / 300k
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::TradeSide;
use crate::types::MarketCapClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WhaleTier {
    S,
    M,
    X,
}

impl std::fmt::Display for WhaleTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S => write!(f, "S"),
            Self::M => write!(f, "M"),
            Self::X => write!(f, "X"),
        }
    }
}

/// Tier boundaries for one market-cap class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhaleThresholds {
    pub small: f64,
    pub medium: f64,
    pub large: f64,
}

impl WhaleThresholds {
    pub const fn new(small: f64, medium: f64, large: f64) -> Self {
        Self {
            small,
            medium,
            large,
        }
    }

    pub fn tier_for(&self, notional: f64) -> Option<WhaleTier> {
        if notional >= self.large {
            Some(WhaleTier::X)
        } else if notional >= self.medium {
            Some(WhaleTier::M)
        } else if notional >= self.small {
            Some(WhaleTier::S)
        } else {
            None
        }
    }

    fn is_ascending(&self) -> bool {
        self.small > 0.0 && self.small < self.medium && self.medium < self.large
    }
}

/// One value per market-cap class.  UNKNOWN uses the MICRO value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapScaled<T> {
    pub high: T,
    pub mid: T,
    pub low: T,
    pub micro: T,
}

impl<T> CapScaled<T> {
    pub fn for_class(&self, class: MarketCapClass) -> &T {
        match class {
            MarketCapClass::High => &self.high,
            MarketCapClass::Mid => &self.mid,
            MarketCapClass::Low => &self.low,
            MarketCapClass::Micro | MarketCapClass::Unknown => &self.micro,
        }
    }

    /// Values from the largest class to the smallest.
    pub fn descending(&self) -> [&T; 4] {
        [&self.high, &self.mid, &self.low, &self.micro]
    }
}

impl CapScaled<WhaleThresholds> {
    /// Every class ascending S < M < X, and no smaller class demanding
    /// more than a larger one on any tier.
    pub fn validate(&self) -> Result<(), String> {
        for (name, t) in ["high", "mid", "low", "micro"].iter().zip(self.descending()) {
            if !t.is_ascending() {
                return Err(format!(
                    "whale tiers for {name} must satisfy 0 < small < medium < large"
                ));
            }
        }
        for pair in self.descending().windows(2) {
            let (bigger, smaller) = (pair[0], pair[1]);
            if smaller.small > bigger.small
                || smaller.medium > bigger.medium
                || smaller.large > bigger.large
            {
                return Err("whale tiers must not grow as market cap shrinks".to_string());
            }
        }
        Ok(())
    }
}

impl CapScaled<f64> {
    pub fn validate_positive_descending(&self, what: &str) -> Result<(), String> {
        let values = self.descending();
        if values.iter().any(|v| !(**v > 0.0)) {
            return Err(format!("{what} thresholds must be positive"));
        }
        if values.windows(2).any(|w| *w[1] > *w[0]) {
            return Err(format!("{what} thresholds must not grow as market cap shrinks"));
        }
        Ok(())
    }
}

impl Default for CapScaled<WhaleThresholds> {
    fn default() -> Self {
        Self {
            high: WhaleThresholds::new(500_000.0, 1_000_000.0, 1_500_000.0),
            mid: WhaleThresholds::new(200_000.0, 400_000.0, 800_000.0),
            low: WhaleThresholds::new(100_000.0, 200_000.0, 400_000.0),
            micro: WhaleThresholds::new(80_000.0, 150_000.0, 300_000.0),
        }
    }
}

/// Default net-delta thresholds (absolute USD) per class.
impl Default for CapScaled<f64> {
    fn default() -> Self {
        Self {
            high: 1_500_000.0,
            mid: 600_000.0,
            low: 250_000.0,
            micro: 150_000.0,
        }
    }
}

/// Largest qualifying print on one side of the tape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhaleEvent {
    pub price: f64,
    pub size: f64,
    pub notional: f64,
    pub side: TradeSide,
    pub tier: WhaleTier,
    pub timestamp: i64,
}
