// =============================================================================
// Signal Classifier — one (symbol, timeframe) series in, one verdict out
// =============================================================================
//
// Pipeline per series:
//   1. Data gate        — enough candles for every indicator look-back.
//   2. Liquidity gate   — last candle quote turnover >= floor.
//   3. Gap gate         — optional; a last-candle move larger than the limit
//                         marks the series as unstable and skips it.
//   4. Indicator snapshot (EMA fast/slow, RSI, ADX, MACD, volume ratio, BOS).
//   5. Decision rule:
//        BUY  = trend up   AND rsi > buy floor    AND volume >= buy ratio
//        SELL = trend down AND rsi < sell ceiling AND sell volume rule
//        [+ ADX floor, MACD confirmation, BOS confirmation when configured]
//      A miss whose volume leg failed is LOW VOLUME, any other miss NO SIGNAL.
//   6. Confidence = floor(clamp(ratio * 25 + adx / 3 + rsi / 5, 0, 100)).
//
// Variants of the rule differ only in thresholds and confirmations; they are
// expressed as `ClassifierPreset`s over one `ClassifierConfig`.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::indicators::{IndicatorParams, IndicatorSnapshot, StructureBreak, VolumeBaseline};
use crate::market_data::SeriesContext;
use crate::types::{Exchange, Side, Trend};

// =============================================================================
// Configuration
// =============================================================================

/// How volume must behave for a SELL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SellVolumeRule {
    /// Volume fading: ratio at or below `max_ratio`.
    Drying { max_ratio: f64 },
    /// Volume expanding into a red candle: ratio at or above `min_ratio` and
    /// the last close below the previous one.
    Surge { min_ratio: f64 },
}

/// Named threshold sets.  None of them is canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierPreset {
    /// Multi-timeframe scan, permissive volume rules, 100k liquidity floor.
    Classic,
    /// Same rules as `Classic` with a 200k liquidity floor.
    Conservative,
    /// Short-horizon scan with trend-strength, MACD and structure
    /// confirmations, a 500k floor and a 5% gap filter.
    Strict,
}

impl std::str::FromStr for ClassifierPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "conservative" => Ok(Self::Conservative),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown classifier preset '{other}'")),
        }
    }
}

/// Every tunable of the classification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Series shorter than this are rejected as insufficient.
    pub min_candles: usize,
    /// Minimum quote turnover of the last candle.
    pub min_turnover: f64,
    pub indicators: IndicatorParams,

    pub buy_rsi_floor: f64,
    pub buy_volume_ratio: f64,
    pub sell_rsi_ceiling: f64,
    pub sell_volume: SellVolumeRule,

    /// ADX floor applied to both sides when set.
    pub min_trend_strength: Option<f64>,
    /// BUY needs MACD line > signal, SELL needs line < signal.
    pub require_macd_confirmation: bool,
    /// BUY needs a break of structure up, SELL a break down.
    pub require_break_of_structure: bool,
    /// Skip series whose last candle moved more than this fraction.
    pub max_gap_pct: Option<f64>,
    /// Attach the perpetual funding rate to emitted signals.
    pub annotate_funding: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::preset(ClassifierPreset::Classic)
    }
}

impl ClassifierConfig {
    pub fn preset(preset: ClassifierPreset) -> Self {
        match preset {
            ClassifierPreset::Classic => Self {
                min_candles: 60,
                min_turnover: 100_000.0,
                indicators: IndicatorParams::default(),
                buy_rsi_floor: 50.0,
                buy_volume_ratio: 1.10,
                sell_rsi_ceiling: 60.0,
                sell_volume: SellVolumeRule::Drying { max_ratio: 0.90 },
                min_trend_strength: None,
                require_macd_confirmation: false,
                require_break_of_structure: false,
                max_gap_pct: None,
                annotate_funding: false,
            },
            ClassifierPreset::Conservative => Self {
                min_turnover: 200_000.0,
                ..Self::preset(ClassifierPreset::Classic)
            },
            ClassifierPreset::Strict => Self {
                min_candles: 80,
                min_turnover: 500_000.0,
                indicators: IndicatorParams {
                    volume_baseline: VolumeBaseline::VolumeSma { window: 20 },
                    bos_lookback: 30,
                    ..IndicatorParams::default()
                },
                buy_rsi_floor: 55.0,
                buy_volume_ratio: 1.3,
                sell_rsi_ceiling: 45.0,
                sell_volume: SellVolumeRule::Surge { min_ratio: 1.3 },
                min_trend_strength: Some(10.0),
                require_macd_confirmation: true,
                require_break_of_structure: true,
                max_gap_pct: Some(0.05),
                annotate_funding: true,
            },
        }
    }
}

// =============================================================================
// Outcome types
// =============================================================================

/// A directional call for one (exchange, symbol, timeframe) in one run.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub exchange: Exchange,
    pub symbol: String,
    pub timeframe: String,
    pub side: Side,
    /// Integer score in [0, 100].
    pub confidence: u8,
    pub rsi: f64,
    pub adx: f64,
    pub volume_ratio: f64,
    pub trend: Trend,
    pub structure_break: StructureBreak,
    pub last_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_rate: Option<f64>,
}

/// Why a pair produced no signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SkipReason {
    /// Transport failed after the provider's retry policy.
    FetchFailed,
    /// Series shorter than the required look-back.
    InsufficientData,
    /// Last candle turnover below the liquidity floor.
    LowLiquidity,
    /// Last candle moved more than the gap limit.
    PriceGap,
    /// Trend was there but volume did not confirm it.
    LowVolume,
    /// Data was fine; the rule did not fire.
    NoSignal,
    /// Task exceeded its time budget.
    TimedOut,
    /// Task panicked or could not be scheduled.
    TaskFailed,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FetchFailed => write!(f, "fetch failed"),
            Self::InsufficientData => write!(f, "insufficient data"),
            Self::LowLiquidity => write!(f, "low liquidity"),
            Self::PriceGap => write!(f, "price gap"),
            Self::LowVolume => write!(f, "low volume"),
            Self::NoSignal => write!(f, "no signal"),
            Self::TimedOut => write!(f, "timed out"),
            Self::TaskFailed => write!(f, "task failed"),
        }
    }
}

// =============================================================================
// SignalClassifier
// =============================================================================

/// Stateless classifier over an immutable config.
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    config: ClassifierConfig,
}

impl SignalClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify one series.
    pub fn classify(&self, ctx: &SeriesContext) -> Result<Signal, SkipReason> {
        let cfg = &self.config;

        if ctx.len() < cfg.min_candles.max(2) {
            return Err(SkipReason::InsufficientData);
        }

        let candles = &ctx.candles;
        let last = &candles[candles.len() - 1];
        if last.quote_turnover < cfg.min_turnover {
            return Err(SkipReason::LowLiquidity);
        }

        if let Some(max_gap) = cfg.max_gap_pct {
            let prev_close = candles[candles.len() - 2].close;
            if prev_close > 0.0 && (last.close / prev_close - 1.0).abs() > max_gap {
                return Err(SkipReason::PriceGap);
            }
        }

        let snapshot = IndicatorSnapshot::compute(candles, &cfg.indicators)
            .ok_or(SkipReason::InsufficientData)?;

        let side = match self.decide(&snapshot) {
            Some(side) => side,
            None if !self.volume_confirms(&snapshot) => return Err(SkipReason::LowVolume),
            None => return Err(SkipReason::NoSignal),
        };

        trace!(
            series = %ctx,
            side = %side,
            rsi = snapshot.rsi,
            adx = snapshot.adx,
            volume_ratio = snapshot.volume_ratio,
            "series classified"
        );

        Ok(Signal {
            exchange: ctx.exchange,
            symbol: ctx.symbol.clone(),
            timeframe: ctx.timeframe.clone(),
            side,
            confidence: confidence_score(&snapshot),
            rsi: snapshot.rsi,
            adx: snapshot.adx,
            volume_ratio: snapshot.volume_ratio,
            trend: if snapshot.trend_up() { Trend::Up } else { Trend::Down },
            structure_break: StructureBreak::from_flags(
                snapshot.break_of_structure_up,
                snapshot.break_of_structure_down,
            ),
            last_price: snapshot.last_close,
            funding_rate: None,
        })
    }

    /// Apply the decision rule to a snapshot.
    pub fn decide(&self, s: &IndicatorSnapshot) -> Option<Side> {
        let cfg = &self.config;

        let strong_enough = cfg.min_trend_strength.map_or(true, |min| s.adx >= min);

        if s.trend_up() {
            let fires = s.rsi > cfg.buy_rsi_floor
                && self.volume_confirms(s)
                && strong_enough
                && (!cfg.require_macd_confirmation || s.macd_line > s.macd_signal)
                && (!cfg.require_break_of_structure || s.break_of_structure_up);
            return fires.then_some(Side::Buy);
        }

        let fires = s.rsi < cfg.sell_rsi_ceiling
            && self.volume_confirms(s)
            && strong_enough
            && (!cfg.require_macd_confirmation || s.macd_line < s.macd_signal)
            && (!cfg.require_break_of_structure || s.break_of_structure_down);
        fires.then_some(Side::Sell)
    }

    /// Volume leg of the rule for the side the trend points to.
    fn volume_confirms(&self, s: &IndicatorSnapshot) -> bool {
        if s.trend_up() {
            return s.volume_ratio >= self.config.buy_volume_ratio;
        }
        match self.config.sell_volume {
            SellVolumeRule::Drying { max_ratio } => s.volume_ratio <= max_ratio,
            SellVolumeRule::Surge { min_ratio } => s.volume_ratio >= min_ratio && s.last_return < 0.0,
        }
    }
}

/// Blend of volume surprise, trend strength and momentum, floored to an
/// integer in [0, 100].
pub fn confidence_score(s: &IndicatorSnapshot) -> u8 {
    let raw = s.volume_ratio * 25.0 + s.adx / 3.0 + s.rsi / 5.0;
    if !raw.is_finite() {
        return 0;
    }
    raw.clamp(0.0, 100.0).floor() as u8
}
