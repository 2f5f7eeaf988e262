// =============================================================================
// Order-Flow Module
// =============================================================================
//
// Trade-tape aggregation: buy/sell notional, net delta, and the largest whale
// print per side, with thresholds scaled by market-cap class.

pub mod analyzer;
pub mod whale;

pub use analyzer::{OrderflowAnalyzer, OrderflowConfig};
pub use whale::{CapScaled, WhaleEvent};
