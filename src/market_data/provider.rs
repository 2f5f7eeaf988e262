use anyhow::Result;
use async_trait::async_trait;

use crate::market_data::{Candle, Trade};
use crate::types::Exchange;

/// Source of candles and trade tapes for one exchange.
///
/// Implementations own their transport concerns (timeouts, retries, weight
/// limits).  A transport failure that survives the retry policy is returned
/// as `Err`; the scanner records it as a skipped pair and moves on.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Exchange served by this provider (for logging and signal tagging).
    fn exchange(&self) -> Exchange;

    /// Symbols quoted in `quote_asset`, sorted by descending 24h quote
    /// turnover, truncated to `limit`.
    async fn list_liquid_symbols(&self, quote_asset: &str, limit: usize) -> Result<Vec<String>>;

    /// Candles for `symbol` on `timeframe`, oldest first.  The last candle
    /// may still be forming.
    async fn get_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Most recent trades for `symbol`, oldest first.
    async fn get_trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>>;

    /// 24h price change of `symbol` in percent, when the venue reports it.
    async fn price_change_24h(&self, _symbol: &str) -> Option<f64> {
        None
    }

    /// Current perpetual funding rate (as a decimal), when the venue has one.
    async fn funding_rate(&self, _symbol: &str) -> Option<f64> {
        None
    }
}
