// =============================================================================
// Market Data Module
// =============================================================================
//
// Immutable market data records (candles, trades) plus the provider seam that
// every exchange client implements.  Nothing here performs indicator math.

pub mod candle;
pub mod provider;
pub mod trade;

// Re-export for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, SeriesContext};
pub use provider::MarketDataProvider;
pub use trade::{Trade, TradeSide};
