// =============================================================================
// Market-Cap Book
// =============================================================================
//
// Maps a coin's base symbol (BTC, SOL, ...) to a `MarketCapClass`, used to
// scale whale and net-delta thresholds.  Built from a `/coins/markets`
// snapshot ordered by market cap descending; the first entry for a ticker
// wins, so a large coin is never shadowed by a small one reusing its symbol.
//
//   cap >= high  => HIGH
//   cap >= mid   => MID
//   cap >= low   => LOW
//   otherwise    => MICRO
//   not listed   => UNKNOWN
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::MarketCapClass;

/// Quote suffixes stripped from exchange symbols before lookup.
const QUOTE_SUFFIXES: [&str; 4] = ["USDT", "USDC", "FDUSD", "BUSD"];

/// Lower bounds (USD) of the market-cap classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketCapBounds {
    pub high: f64,
    pub mid: f64,
    pub low: f64,
}

impl Default for MarketCapBounds {
    fn default() -> Self {
        Self {
            high: 10_000_000_000.0,
            mid: 1_000_000_000.0,
            low: 100_000_000.0,
        }
    }
}

impl MarketCapBounds {
    pub fn class_for(&self, market_cap: f64) -> MarketCapClass {
        if market_cap >= self.high {
            MarketCapClass::High
        } else if market_cap >= self.mid {
            MarketCapClass::Mid
        } else if market_cap >= self.low {
            MarketCapClass::Low
        } else {
            MarketCapClass::Micro
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketCapBook {
    bounds: MarketCapBounds,
    caps: HashMap<String, f64>,
}

impl MarketCapBook {
    pub fn new(bounds: MarketCapBounds) -> Self {
        Self {
            bounds,
            caps: HashMap::new(),
        }
    }

    /// Record a market cap for `base`, keeping an existing entry.
    pub fn insert(&mut self, base: &str, market_cap: f64) -> bool {
        if !market_cap.is_finite() || market_cap < 0.0 {
            return false;
        }
        let key = base.to_ascii_uppercase();
        if self.caps.contains_key(&key) {
            return false;
        }
        self.caps.insert(key, market_cap);
        true
    }

    /// Add the entries of one `/coins/markets` page.  Returns how many rows
    /// the page contained (not how many were new).
    pub fn extend_from_json(&mut self, body: &serde_json::Value) -> usize {
        let Some(rows) = body.as_array() else {
            return 0;
        };
        for row in rows {
            if let (Some(sym), Some(cap)) = (row["symbol"].as_str(), row["market_cap"].as_f64()) {
                self.insert(sym, cap);
            }
        }
        rows.len()
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    /// Classify a base asset or a full exchange symbol (`SOLUSDT` => `SOL`).
    pub fn classify(&self, symbol: &str) -> MarketCapClass {
        let upper = symbol.to_ascii_uppercase();
        let base = QUOTE_SUFFIXES
            .iter()
            .find_map(|q| upper.strip_suffix(q).filter(|b| !b.is_empty()))
            .unwrap_or(&upper);

        match self.caps.get(base) {
            Some(&cap) => self.bounds.class_for(cap),
            None => MarketCapClass::Unknown,
        }
    }
}
