// =============================================================================
// Market Regime Classifier
// =============================================================================
//
// Combines the trend state of a reference asset (BTCUSDT by default) on
// several timeframes with global market aggregates into one `RegimeState`,
// computed once per run and shared read-only by every classification task.
//
// Reference trend per timeframe (EMA20 / EMA50 / RSI14 on closes):
//
//   STRONG   — EMA20 > EMA50 AND RSI > 50
//   WEAK     — EMA20 < EMA50 AND RSI < 50
//   NEUTRAL  — anything else, including missing data
//
// Guard: BUY signals of the whole run are suppressed when every guard
// timeframe is WEAK and the total market 24h change is <= 0.
//
// Advisory only, never changing an outcome:
//
//   companions  trend of further assets (ETHUSDT 1h by default)
//   BTC.D arrow reference 24h change against total-market 24h change; a
//               falling arrow with a non-negative total reads as alt inflow
//   USDT.D      >= 7% risk-off, <= 5% risk-on
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::indicators::ema::last_ema;
use crate::indicators::rsi::current_rsi;
use crate::market_data::MarketDataProvider;
use crate::market_intel::{GlobalMarketSource, GlobalMarketStats};
use crate::types::{Exchange, Side};

// =============================================================================
// Types
// =============================================================================

/// Trend/momentum state of the reference asset on one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceTrend {
    Strong,
    Weak,
    Neutral,
}

impl std::fmt::Display for ReferenceTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strong => write!(f, "STRONG"),
            Self::Weak => write!(f, "WEAK"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Advisory reading of stablecoin dominance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StablecoinMood {
    RiskOff,
    RiskOn,
    Neutral,
}

/// Settings of the regime classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Apply the BUY guard at all.
    pub guard_enabled: bool,
    pub reference_symbol: String,
    /// Venue the reference candles are fetched from.
    pub reference_exchange: Exchange,
    /// Timeframes whose reference trend is computed and reported.
    pub timeframes: Vec<String>,
    /// Timeframes that must all be WEAK for the guard to trip.
    pub guard_timeframes: Vec<String>,
    pub candle_limit: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    /// Assets whose trend is reported next to the reference, on
    /// `companion_timeframe`.
    pub companion_symbols: Vec<String>,
    pub companion_timeframe: String,
    /// Stablecoin dominance at or above which the note reads risk-off.
    pub risk_off_dominance_pct: f64,
    /// Stablecoin dominance at or below which the note reads risk-on.
    pub risk_on_dominance_pct: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            guard_enabled: true,
            reference_symbol: "BTCUSDT".to_string(),
            reference_exchange: Exchange::Binance,
            timeframes: vec!["1h".to_string(), "4h".to_string()],
            guard_timeframes: vec!["1h".to_string(), "4h".to_string()],
            candle_limit: 200,
            ema_fast: 20,
            ema_slow: 50,
            rsi_period: 14,
            companion_symbols: vec!["ETHUSDT".to_string()],
            companion_timeframe: "1h".to_string(),
            risk_off_dominance_pct: 7.0,
            risk_on_dominance_pct: 5.0,
        }
    }
}

/// Trend of an advisory asset on one timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanionTrend {
    pub symbol: String,
    pub timeframe: String,
    pub trend: ReferenceTrend,
}

/// Run-wide market regime.
#[derive(Debug, Clone, Serialize)]
pub struct RegimeState {
    pub reference_symbol: String,
    /// `(timeframe, trend)` in configured order.
    pub reference_trends: Vec<(String, ReferenceTrend)>,
    /// 24h price change of the reference asset, when the venue reports it.
    pub reference_change_24h_pct: Option<f64>,
    pub companion_trends: Vec<CompanionTrend>,
    pub total_market_change_pct: f64,
    pub btc_dominance_pct: Option<f64>,
    pub usdt_dominance_pct: Option<f64>,
    pub buy_suppressed: bool,
    pub stablecoin_mood: StablecoinMood,
}

impl RegimeState {
    /// Whether a signal on `side` survives the run-wide guard.
    pub fn admits(&self, side: Side) -> bool {
        !(self.buy_suppressed && side == Side::Buy)
    }

    /// Arrow of the reference share of the market: the reference asset
    /// outperforming the total market reads as rising dominance.
    pub fn dominance_arrow(&self) -> Option<&'static str> {
        self.reference_change_24h_pct
            .map(|chg| direction_arrow(chg - self.total_market_change_pct))
    }

    fn flow(&self) -> &'static str {
        let total = self.total_market_change_pct;
        match self.dominance_arrow() {
            Some("↓") if total >= 0.0 => "↑ (inflow to alts)",
            Some("↑") if total <= 0.0 => "↓ (outflow)",
            Some(_) => "→ (mixed)",
            None if total > 0.0 => "↑ (inflow to alts)",
            None if total < 0.0 => "↓ (outflow)",
            None => "→ (mixed)",
        }
    }

    /// One-line market summary for the report header.
    pub fn note(&self) -> String {
        let base = base_asset(&self.reference_symbol);
        let btc_d = self
            .btc_dominance_pct
            .map_or_else(|| "?".to_string(), |d| format!("{d:.1}%"));

        let mut parts = Vec::new();
        if let (Some(chg), Some(arrow)) = (self.reference_change_24h_pct, self.dominance_arrow()) {
            parts.push(format!("{base} {} + BTC.D {arrow} (BTC.D {btc_d})", direction_arrow(chg)));
        }
        parts.extend(
            self.reference_trends
                .iter()
                .map(|(tf, t)| format!("{base}({}) {t}", tf.to_uppercase())),
        );
        parts.extend(self.companion_trends.iter().map(|c| {
            format!("{}({}) {}", base_asset(&c.symbol), c.timeframe.to_uppercase(), c.trend)
        }));
        if self.reference_change_24h_pct.is_none() {
            parts.push(format!("BTC.D {btc_d}"));
        }
        parts.push(format!("Total: {}", self.flow()));

        let usdt_d = match self.usdt_dominance_pct {
            Some(d) => {
                let mood = match self.stablecoin_mood {
                    StablecoinMood::RiskOff => " (risk-off)",
                    StablecoinMood::RiskOn => " (risk-on)",
                    StablecoinMood::Neutral => "",
                };
                format!("{d:.1}%{mood}")
            }
            None => "?".to_string(),
        };
        parts.push(format!("USDT.D: {usdt_d}"));

        format!("Market: {}", parts.join(" | "))
    }
}

fn base_asset(symbol: &str) -> &str {
    symbol.strip_suffix("USDT").unwrap_or(symbol)
}

fn direction_arrow(delta: f64) -> &'static str {
    if delta > 0.0 {
        "↑"
    } else if delta < 0.0 {
        "↓"
    } else {
        "→"
    }
}

// =============================================================================
// Pure classification
// =============================================================================

/// Classify the reference trend from closes.  Missing data is NEUTRAL.
pub fn classify_reference_trend(closes: &[f64], config: &RegimeConfig) -> ReferenceTrend {
    let (Some(fast), Some(slow), Some(rsi)) = (
        last_ema(closes, config.ema_fast),
        last_ema(closes, config.ema_slow),
        current_rsi(closes, config.rsi_period),
    ) else {
        return ReferenceTrend::Neutral;
    };

    if fast > slow && rsi > 50.0 {
        ReferenceTrend::Strong
    } else if fast < slow && rsi < 50.0 {
        ReferenceTrend::Weak
    } else {
        ReferenceTrend::Neutral
    }
}

pub fn stablecoin_mood(usdt_dominance_pct: Option<f64>, config: &RegimeConfig) -> StablecoinMood {
    match usdt_dominance_pct {
        Some(d) if d >= config.risk_off_dominance_pct => StablecoinMood::RiskOff,
        Some(d) if d <= config.risk_on_dominance_pct => StablecoinMood::RiskOn,
        _ => StablecoinMood::Neutral,
    }
}

// =============================================================================
// RegimeClassifier
// =============================================================================

#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    /// Combine reference trends and global stats into a `RegimeState`.
    pub fn evaluate(
        &self,
        reference_trends: Vec<(String, ReferenceTrend)>,
        global: &GlobalMarketStats,
    ) -> RegimeState {
        let cfg = &self.config;

        let all_guard_weak = !cfg.guard_timeframes.is_empty()
            && cfg.guard_timeframes.iter().all(|tf| {
                reference_trends
                    .iter()
                    .any(|(t, trend)| t.eq_ignore_ascii_case(tf) && *trend == ReferenceTrend::Weak)
            });

        let buy_suppressed =
            cfg.guard_enabled && all_guard_weak && global.total_market_change_pct <= 0.0;

        RegimeState {
            reference_symbol: cfg.reference_symbol.clone(),
            reference_trends,
            reference_change_24h_pct: None,
            companion_trends: Vec::new(),
            total_market_change_pct: global.total_market_change_pct,
            btc_dominance_pct: global.btc_dominance_pct,
            usdt_dominance_pct: global.usdt_dominance_pct,
            buy_suppressed,
            stablecoin_mood: stablecoin_mood(global.usdt_dominance_pct, cfg),
        }
    }

    async fn trend_of(
        &self,
        provider: &dyn MarketDataProvider,
        symbol: &str,
        timeframe: &str,
    ) -> ReferenceTrend {
        let cfg = &self.config;
        let trend = match provider.get_candles(symbol, timeframe, cfg.candle_limit).await {
            Ok(candles) => {
                let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
                classify_reference_trend(&closes, cfg)
            }
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    timeframe = %timeframe,
                    error = %e,
                    "reference candles unavailable, trend treated as NEUTRAL"
                );
                ReferenceTrend::Neutral
            }
        };
        debug!(symbol = %symbol, timeframe = %timeframe, trend = %trend, "reference trend");
        trend
    }

    /// Fetch reference candles, companion candles, the reference 24h change
    /// and global stats, then evaluate.
    ///
    /// Every fetch fails soft: a missing series classifies as NEUTRAL, a
    /// missing 24h change drops the BTC.D arrow and missing global stats fall
    /// back to neutral defaults.
    pub async fn assess(
        &self,
        provider: &dyn MarketDataProvider,
        global_source: &dyn GlobalMarketSource,
    ) -> RegimeState {
        let cfg = &self.config;

        let mut timeframes: Vec<String> = cfg.timeframes.clone();
        for tf in &cfg.guard_timeframes {
            if !timeframes.iter().any(|t| t.eq_ignore_ascii_case(tf)) {
                timeframes.push(tf.clone());
            }
        }

        let trends_fut = async {
            let mut trends = Vec::with_capacity(timeframes.len());
            for tf in &timeframes {
                let trend = self.trend_of(provider, &cfg.reference_symbol, tf).await;
                trends.push((tf.clone(), trend));
            }
            trends
        };

        let companions_fut = async {
            let mut companions = Vec::with_capacity(cfg.companion_symbols.len());
            for symbol in &cfg.companion_symbols {
                let trend = self.trend_of(provider, symbol, &cfg.companion_timeframe).await;
                companions.push(CompanionTrend {
                    symbol: symbol.clone(),
                    timeframe: cfg.companion_timeframe.clone(),
                    trend,
                });
            }
            companions
        };

        let (trends, companions, change, global) = tokio::join!(
            trends_fut,
            companions_fut,
            provider.price_change_24h(&cfg.reference_symbol),
            global_source.global_market_stats()
        );

        let mut state = self.evaluate(trends, &global);
        state.companion_trends = companions;
        state.reference_change_24h_pct = change;

        info!(
            buy_suppressed = state.buy_suppressed,
            total_change_pct = state.total_market_change_pct,
            reference_change_pct = ?state.reference_change_24h_pct,
            "market regime assessed"
        );
        state
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{Candle, Trade};
    use async_trait::async_trait;

    struct ReferenceFeed {
        change_24h: Option<f64>,
    }

    #[async_trait]
    impl MarketDataProvider for ReferenceFeed {
        fn exchange(&self) -> Exchange {
            Exchange::Binance
        }

        async fn list_liquid_symbols(&self, _quote: &str, _limit: usize) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn get_candles(&self, symbol: &str, _tf: &str, _limit: usize) -> anyhow::Result<Vec<Candle>> {
            let closes: Vec<f64> = match symbol {
                "BTCUSDT" => (0..200).map(|i| 400.0 - i as f64).collect(),
                "ETHUSDT" => (0..200).map(|i| 100.0 + i as f64).collect(),
                _ => anyhow::bail!("unknown symbol {symbol}"),
            };
            Ok(closes
                .into_iter()
                .enumerate()
                .map(|(i, c)| Candle::new(i as i64, c, c, c, c, 1.0, c))
                .collect())
        }

        async fn get_trades(&self, _symbol: &str, _limit: usize) -> anyhow::Result<Vec<Trade>> {
            Ok(Vec::new())
        }

        async fn price_change_24h(&self, _symbol: &str) -> Option<f64> {
            self.change_24h
        }
    }

    struct FixedStats(GlobalMarketStats);

    #[async_trait]
    impl GlobalMarketSource for FixedStats {
        async fn global_market_stats(&self) -> GlobalMarketStats {
            self.0.clone()
        }
    }

    fn weak_weak() -> Vec<(String, ReferenceTrend)> {
        vec![
            ("1h".to_string(), ReferenceTrend::Weak),
            ("4h".to_string(), ReferenceTrend::Weak),
        ]
    }

    fn global(total: f64) -> GlobalMarketStats {
        GlobalMarketStats {
            total_market_change_pct: total,
            btc_dominance_pct: Some(55.0),
            usdt_dominance_pct: Some(6.0),
        }
    }

    #[test]
    fn guard_suppresses_buys_only() {
        let state = RegimeClassifier::new(RegimeConfig::default()).evaluate(weak_weak(), &global(-1.0));
        assert!(state.buy_suppressed);
        assert!(!state.admits(Side::Buy));
        assert!(state.admits(Side::Sell));
    }

    #[test]
    fn guard_trips_at_exactly_flat_market() {
        let state = RegimeClassifier::new(RegimeConfig::default()).evaluate(weak_weak(), &global(0.0));
        assert!(state.buy_suppressed);
    }

    #[test]
    fn guard_needs_rising_market_to_stay_off() {
        let state = RegimeClassifier::new(RegimeConfig::default()).evaluate(weak_weak(), &global(0.4));
        assert!(!state.buy_suppressed);
    }

    #[test]
    fn guard_needs_every_guard_timeframe_weak() {
        let trends = vec![
            ("1h".to_string(), ReferenceTrend::Weak),
            ("4h".to_string(), ReferenceTrend::Neutral),
        ];
        let state = RegimeClassifier::new(RegimeConfig::default()).evaluate(trends, &global(-3.0));
        assert!(!state.buy_suppressed);
    }

    #[test]
    fn guard_disabled_never_suppresses() {
        let config = RegimeConfig {
            guard_enabled: false,
            ..RegimeConfig::default()
        };
        let state = RegimeClassifier::new(config).evaluate(weak_weak(), &global(-5.0));
        assert!(!state.buy_suppressed);
        assert!(state.admits(Side::Buy));
    }

    #[test]
    fn reference_trend_classification() {
        let cfg = RegimeConfig::default();
        let rising: Vec<f64> = (0..200).map(|i| 100.0 + i as f64).collect();
        let falling: Vec<f64> = (0..200).map(|i| 400.0 - i as f64).collect();
        assert_eq!(classify_reference_trend(&rising, &cfg), ReferenceTrend::Strong);
        assert_eq!(classify_reference_trend(&falling, &cfg), ReferenceTrend::Weak);
        assert_eq!(classify_reference_trend(&vec![100.0; 200], &cfg), ReferenceTrend::Neutral);
        assert_eq!(classify_reference_trend(&rising[..30], &cfg), ReferenceTrend::Neutral);
    }

    #[test]
    fn stablecoin_mood_thresholds() {
        let cfg = RegimeConfig::default();
        assert_eq!(stablecoin_mood(Some(7.0), &cfg), StablecoinMood::RiskOff);
        assert_eq!(stablecoin_mood(Some(5.0), &cfg), StablecoinMood::RiskOn);
        assert_eq!(stablecoin_mood(Some(6.2), &cfg), StablecoinMood::Neutral);
        assert_eq!(stablecoin_mood(None, &cfg), StablecoinMood::Neutral);
    }

    #[test]
    fn dominance_commentary_does_not_gate() {
        let trends = vec![
            ("1h".to_string(), ReferenceTrend::Strong),
            ("4h".to_string(), ReferenceTrend::Strong),
        ];
        let stats = GlobalMarketStats {
            total_market_change_pct: -2.0,
            btc_dominance_pct: None,
            usdt_dominance_pct: Some(9.0),
        };
        let state = RegimeClassifier::new(RegimeConfig::default()).evaluate(trends, &stats);
        assert_eq!(state.stablecoin_mood, StablecoinMood::RiskOff);
        assert!(!state.buy_suppressed);
    }

    #[test]
    fn note_mentions_trends_and_dominance() {
        let state = RegimeClassifier::new(RegimeConfig::default()).evaluate(weak_weak(), &global(-1.0));
        let note = state.note();
        assert!(note.contains("BTC(1H) WEAK"));
        assert!(note.contains("BTC(4H) WEAK"));
        assert!(note.contains("BTC.D 55.0%"));
        assert!(note.contains("USDT.D: 6.0%"));
        assert!(note.contains("outflow"));
        assert!(state.dominance_arrow().is_none());
    }

    #[test]
    fn dominance_arrow_compares_reference_with_total() {
        let classifier = RegimeClassifier::new(RegimeConfig::default());

        let mut state = classifier.evaluate(weak_weak(), &global(1.0));
        state.reference_change_24h_pct = Some(-0.5);
        assert_eq!(state.dominance_arrow(), Some("↓"));
        let note = state.note();
        assert!(note.starts_with("Market: BTC ↓ + BTC.D ↓ (BTC.D 55.0%) | BTC(1H) WEAK"));
        assert!(note.contains("Total: ↑ (inflow to alts)"));

        let mut state = classifier.evaluate(weak_weak(), &global(-1.0));
        state.reference_change_24h_pct = Some(0.8);
        assert_eq!(state.dominance_arrow(), Some("↑"));
        assert!(state.note().contains("Total: ↓ (outflow)"));

        // Reference falls harder than a falling market: dominance down, no inflow.
        let mut state = classifier.evaluate(weak_weak(), &global(-1.0));
        state.reference_change_24h_pct = Some(-3.0);
        assert!(state.note().contains("Total: → (mixed)"));
        assert!(state.buy_suppressed);
    }

    #[test]
    fn companion_trends_are_listed_after_reference() {
        let mut state = RegimeClassifier::new(RegimeConfig::default()).evaluate(weak_weak(), &global(0.5));
        state.companion_trends.push(CompanionTrend {
            symbol: "ETHUSDT".to_string(),
            timeframe: "1h".to_string(),
            trend: ReferenceTrend::Strong,
        });
        let note = state.note();
        assert!(note.contains("BTC(4H) WEAK | ETH(1H) STRONG | BTC.D 55.0%"));
        assert!(!state.buy_suppressed);
    }

    #[test]
    fn neutral_defaults_render_unknown_dominance() {
        let state = RegimeClassifier::new(RegimeConfig::default())
            .evaluate(Vec::new(), &GlobalMarketStats::default());
        assert!(!state.buy_suppressed);
        assert!(state.note().contains("BTC.D ?"));
        assert!(state.note().contains("→ (mixed)"));
    }

    #[tokio::test]
    async fn assess_collects_companions_and_reference_change() {
        let config = RegimeConfig {
            companion_symbols: vec!["ETHUSDT".to_string(), "XYZUSDT".to_string()],
            ..RegimeConfig::default()
        };
        let feed = ReferenceFeed { change_24h: Some(-2.5) };
        let state = RegimeClassifier::new(config)
            .assess(&feed, &FixedStats(global(-1.0)))
            .await;

        assert!(state.buy_suppressed);
        assert_eq!(state.reference_change_24h_pct, Some(-2.5));
        assert_eq!(
            state.companion_trends.iter().map(|c| c.trend).collect::<Vec<_>>(),
            vec![ReferenceTrend::Strong, ReferenceTrend::Neutral]
        );
        let note = state.note();
        assert!(note.starts_with("Market: BTC ↓ + BTC.D ↓ (BTC.D 55.0%)"));
        assert!(note.contains("ETH(1H) STRONG | XYZ(1H) NEUTRAL"));
        assert!(note.contains("Total: → (mixed)"));
    }

    #[tokio::test]
    async fn assess_without_reference_change_keeps_plain_dominance() {
        let feed = ReferenceFeed { change_24h: None };
        let state = RegimeClassifier::new(RegimeConfig::default())
            .assess(&feed, &FixedStats(global(0.7)))
            .await;
        assert!(!state.buy_suppressed);
        assert!(state.note().contains("BTC.D 55.0% | Total: ↑ (inflow to alts)"));
    }
}
