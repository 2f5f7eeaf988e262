use serde::{Deserialize, Serialize};

use crate::types::Exchange;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle as returned by a spot klines endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base-asset volume.
    pub volume: f64,
    /// Quote-asset notional traded during the candle.
    pub quote_turnover: f64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        quote_turnover: f64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            quote_turnover,
        }
    }
}

/// The unit of indicator computation: one `(exchange, symbol, timeframe)`
/// series, oldest candle first.
#[derive(Debug, Clone)]
pub struct SeriesContext {
    pub exchange: Exchange,
    pub symbol: String,
    pub timeframe: String,
    pub candles: Vec<Candle>,
}

impl SeriesContext {
    pub fn new(
        exchange: Exchange,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        candles: Vec<Candle>,
    ) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }
}

impl std::fmt::Display for SeriesContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}@{}", self.exchange, self.symbol, self.timeframe)
    }
}
