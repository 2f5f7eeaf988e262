// =============================================================================
// Candidate Ranker — order-flow long / short / accumulation picks
// =============================================================================
//
// Works on per-symbol order-flow statistics, independent of the signal
// classifier.  Three buckets, each capped:
//
//   Long          trend UP or FLAT, net delta >= +threshold(class),
//                 buy whale present; by net delta descending.
//   Short         trend DOWN or FLAT, net delta <= -threshold(class),
//                 sell whale present; by net delta ascending.
//   Accumulation  buy whale present, net delta > 0, and price near EMA20
//                 (|price - ema20| / ema20 <= 1%) or a quiet day
//                 (|24h change| < 2%); by buy-whale notional descending.
//
// Sorts are stable: equal keys keep input order, so the same input always
// yields the same selection.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::orderflow::{CapScaled, WhaleEvent};
use crate::types::{Exchange, MarketCapClass};

/// Coarse EMA20 / EMA50 trend tag with a flat band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendTag {
    Up,
    Down,
    Flat,
}

impl TrendTag {
    /// UP when ema20 clears ema50 by more than `flat_band_pct` percent,
    /// DOWN when it trails by more, FLAT otherwise.
    pub fn from_emas(ema20: f64, ema50: f64, flat_band_pct: f64) -> Self {
        let band = flat_band_pct / 100.0;
        if ema20 > ema50 * (1.0 + band) {
            Self::Up
        } else if ema20 < ema50 * (1.0 - band) {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

impl std::fmt::Display for TrendTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Flat => write!(f, "FLAT"),
        }
    }
}

/// Order-flow statistics of one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolStats {
    pub exchange: Exchange,
    pub symbol: String,
    pub trend_tag: TrendTag,
    pub net_delta: f64,
    pub buy_whale: Option<WhaleEvent>,
    pub sell_whale: Option<WhaleEvent>,
    pub pct_change_24h: f64,
    pub last_price: f64,
    pub ema20: f64,
    pub cap_class: MarketCapClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Run the order-flow pass at all.
    pub enabled: bool,
    /// Venue whose trade tapes feed the pass.
    pub exchange: Exchange,
    /// Most liquid symbols of that venue to examine.
    pub symbol_limit: usize,
    pub max_per_bucket: usize,
    pub flat_band_pct: f64,
    pub accumulation_ema_distance_pct: f64,
    pub accumulation_max_abs_change_pct: f64,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exchange: Exchange::Binance,
            symbol_limit: 40,
            max_per_bucket: 3,
            flat_band_pct: 0.2,
            accumulation_ema_distance_pct: 1.0,
            accumulation_max_abs_change_pct: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CandidateSet {
    pub longs: Vec<SymbolStats>,
    pub shorts: Vec<SymbolStats>,
    pub accumulation: Vec<SymbolStats>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.longs.is_empty() && self.shorts.is_empty() && self.accumulation.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CandidateRanker {
    config: CandidateConfig,
    net_delta: CapScaled<f64>,
}

impl CandidateRanker {
    pub fn new(config: CandidateConfig, net_delta: CapScaled<f64>) -> Self {
        Self { config, net_delta }
    }

    pub fn select(&self, stats: &[SymbolStats]) -> CandidateSet {
        let cap = self.config.max_per_bucket;

        let mut longs: Vec<&SymbolStats> = stats
            .iter()
            .filter(|s| {
                matches!(s.trend_tag, TrendTag::Up | TrendTag::Flat)
                    && s.net_delta >= *self.net_delta.for_class(s.cap_class)
                    && s.buy_whale.is_some()
            })
            .collect();
        longs.sort_by(|a, b| b.net_delta.total_cmp(&a.net_delta));

        let mut shorts: Vec<&SymbolStats> = stats
            .iter()
            .filter(|s| {
                matches!(s.trend_tag, TrendTag::Down | TrendTag::Flat)
                    && s.net_delta <= -*self.net_delta.for_class(s.cap_class)
                    && s.sell_whale.is_some()
            })
            .collect();
        shorts.sort_by(|a, b| a.net_delta.total_cmp(&b.net_delta));

        let mut accumulation: Vec<&SymbolStats> = stats
            .iter()
            .filter(|s| s.buy_whale.is_some() && s.net_delta > 0.0 && self.is_quiet(s))
            .collect();
        accumulation.sort_by(|a, b| whale_notional(b).total_cmp(&whale_notional(a)));

        let take = |v: Vec<&SymbolStats>| -> Vec<SymbolStats> {
            v.into_iter().take(cap).cloned().collect()
        };
        CandidateSet {
            longs: take(longs),
            shorts: take(shorts),
            accumulation: take(accumulation),
        }
    }

    fn is_quiet(&self, s: &SymbolStats) -> bool {
        let near_ema = s.ema20 > 0.0
            && ((s.last_price - s.ema20).abs() / s.ema20) * 100.0
                <= self.config.accumulation_ema_distance_pct;
        near_ema || s.pct_change_24h.abs() < self.config.accumulation_max_abs_change_pct
    }
}

fn whale_notional(s: &SymbolStats) -> f64 {
    s.buy_whale.as_ref().map_or(0.0, |w| w.notional)
}
