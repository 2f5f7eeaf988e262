// =============================================================================
// Market Intelligence Module
// =============================================================================
//
// Market-wide data that is not tied to one exchange: total market-cap change,
// dominance figures, and per-coin market-cap classification.

pub mod global_market;
pub mod market_cap;

pub use global_market::{CoinGeckoClient, GlobalMarketSource, GlobalMarketStats};
pub use market_cap::{MarketCapBook, MarketCapBounds};
