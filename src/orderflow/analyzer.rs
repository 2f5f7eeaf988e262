// =============================================================================
// Order-Flow Analyzer
// =============================================================================
//
// Folds a recent-trades tape into per-side notional totals:
//
//   notional   = price * |size|
//   net_delta  = buy_notional - sell_notional
//
// and keeps, per side, the single highest-notional print that reaches the S
// tier of the coin's market-cap class.  Prints below S still count towards
// the totals.  Ties keep the earlier print.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::whale::{CapScaled, WhaleEvent, WhaleThresholds};
use crate::market_data::{Trade, TradeSide};
use crate::types::MarketCapClass;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderflowConfig {
    pub whale_tiers: CapScaled<WhaleThresholds>,
    /// Absolute net delta a candidate must reach, per class.
    pub net_delta: CapScaled<f64>,
    /// Trades fetched per symbol.
    pub trade_limit: usize,
}

impl Default for OrderflowConfig {
    fn default() -> Self {
        Self {
            whale_tiers: CapScaled::default(),
            net_delta: CapScaled::default(),
            trade_limit: 200,
        }
    }
}

impl OrderflowConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.whale_tiers.validate()?;
        self.net_delta.validate_positive_descending("net delta")?;
        if self.trade_limit == 0 {
            return Err("orderflow trade_limit must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderflowSummary {
    pub buy_notional: f64,
    pub sell_notional: f64,
    pub net_delta: f64,
    pub buy_whale: Option<WhaleEvent>,
    pub sell_whale: Option<WhaleEvent>,
    pub trade_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct OrderflowAnalyzer {
    config: OrderflowConfig,
}

impl OrderflowAnalyzer {
    pub fn new(config: OrderflowConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, trades: &[Trade], class: MarketCapClass) -> OrderflowSummary {
        let tiers = self.config.whale_tiers.for_class(class);
        let mut summary = OrderflowSummary::default();

        for trade in trades {
            let notional = trade.notional();
            if !notional.is_finite() {
                continue;
            }
            summary.trade_count += 1;

            let (total, best) = match trade.side {
                TradeSide::Buy => (&mut summary.buy_notional, &mut summary.buy_whale),
                TradeSide::Sell => (&mut summary.sell_notional, &mut summary.sell_whale),
            };
            *total += notional;

            let Some(tier) = tiers.tier_for(notional) else {
                continue;
            };
            if best.as_ref().map_or(true, |w| notional > w.notional) {
                *best = Some(WhaleEvent {
                    price: trade.price,
                    size: trade.size.abs(),
                    notional,
                    side: trade.side,
                    tier,
                    timestamp: trade.timestamp,
                });
            }
        }

        summary.net_delta = summary.buy_notional - summary.sell_notional;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderflow::whale::WhaleTier;

    fn trade(notional: f64, side: TradeSide, ts: i64) -> Trade {
        Trade::new(10.0, notional / 10.0, side, ts)
    }

    #[test]
    fn mid_cap_whale_and_sub_threshold_print() {
        let analyzer = OrderflowAnalyzer::default();
        let trades = vec![
            trade(450_000.0, TradeSide::Buy, 1),
            trade(150_000.0, TradeSide::Buy, 2),
        ];
        let s = analyzer.analyze(&trades, MarketCapClass::Mid);

        let whale = s.buy_whale.unwrap();
        assert_eq!(whale.tier, WhaleTier::M);
        assert!((whale.notional - 450_000.0).abs() < 1e-6);
        assert!((s.buy_notional - 600_000.0).abs() < 1e-6);
        assert!(s.sell_whale.is_none());
        assert_eq!(s.trade_count, 2);
    }

    #[test]
    fn net_delta_is_buy_minus_sell() {
        let analyzer = OrderflowAnalyzer::default();
        let trades = vec![
            trade(50_000.0, TradeSide::Buy, 1),
            trade(120_000.0, TradeSide::Sell, 2),
            trade(30_000.0, TradeSide::Buy, 3),
        ];
        let s = analyzer.analyze(&trades, MarketCapClass::High);
        assert!((s.net_delta + 40_000.0).abs() < 1e-6);
        assert!(s.buy_whale.is_none() && s.sell_whale.is_none());
    }

    #[test]
    fn keeps_largest_print_per_side_first_on_ties() {
        let analyzer = OrderflowAnalyzer::default();
        let trades = vec![
            trade(90_000.0, TradeSide::Sell, 1),
            trade(310_000.0, TradeSide::Sell, 2),
            trade(310_000.0, TradeSide::Sell, 3),
            trade(85_000.0, TradeSide::Buy, 4),
        ];
        let s = analyzer.analyze(&trades, MarketCapClass::Unknown);
        let sell = s.sell_whale.unwrap();
        assert_eq!(sell.tier, WhaleTier::X);
        assert_eq!(sell.timestamp, 2);
        assert_eq!(s.buy_whale.unwrap().tier, WhaleTier::S);
    }

    #[test]
    fn negative_sizes_use_absolute_notional() {
        let analyzer = OrderflowAnalyzer::default();
        let trades = vec![Trade::new(100.0, -3_000.0, TradeSide::Sell, 1)];
        let s = analyzer.analyze(&trades, MarketCapClass::Low);
        assert!((s.sell_notional - 300_000.0).abs() < 1e-6);
        assert_eq!(s.sell_whale.unwrap().tier, WhaleTier::M);
    }

    #[test]
    fn empty_tape() {
        let s = OrderflowAnalyzer::default().analyze(&[], MarketCapClass::High);
        assert_eq!(s.trade_count, 0);
        assert_eq!(s.net_delta, 0.0);
    }

    #[test]
    fn net_delta_threshold_by_class() {
        let config = OrderflowConfig::default();
        assert_eq!(*config.net_delta.for_class(MarketCapClass::High), 1_500_000.0);
        assert_eq!(*config.net_delta.for_class(MarketCapClass::Unknown), 150_000.0);
        assert!(config.validate().is_ok());
    }
}
