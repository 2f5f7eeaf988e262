// =============================================================================
// Shared types used across the signal scanner
// =============================================================================

use serde::{Deserialize, Serialize};

/// Spot exchange a symbol universe and its market data come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Binance,
    Mexc,
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binance => write!(f, "BINANCE"),
            Self::Mexc => write!(f, "MEXC"),
        }
    }
}

/// Direction of a classified signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Fast/slow EMA ordering of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
        }
    }
}

/// Market-capitalisation bucket used to scale order-flow thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketCapClass {
    High,
    Mid,
    Low,
    Micro,
    Unknown,
}

impl Default for MarketCapClass {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for MarketCapClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Mid => write!(f, "MID"),
            Self::Low => write!(f, "LOW"),
            Self::Micro => write!(f, "MICRO"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
