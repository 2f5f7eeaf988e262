// =============================================================================
// Indicator Snapshot — every indicator a classifier reads, for the last candle
// =============================================================================

use serde::{Deserialize, Serialize};

use super::adx::calculate_adx;
use super::ema::last_ema;
use super::macd::current_macd;
use super::rsi::current_rsi;
use super::structure::{break_of_structure_down, break_of_structure_up};
use super::volume::{volume_ratio, volume_ratio_sma};
use crate::market_data::Candle;

/// Which baseline the volume ratio is measured against, and on which field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolumeBaseline {
    /// Quote turnover against EMA(span) one step back.
    TurnoverEma { span: usize },
    /// Base volume against the SMA of the preceding `window` candles.
    VolumeSma { window: usize },
}

impl Default for VolumeBaseline {
    fn default() -> Self {
        Self::TurnoverEma { span: 10 }
    }
}

/// Look-back parameters for every indicator in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub adx_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_baseline: VolumeBaseline,
    pub bos_lookback: usize,
    pub bos_exclude_last: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_fast: 20,
            ema_slow: 50,
            rsi_period: 14,
            adx_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_baseline: VolumeBaseline::default(),
            bos_lookback: 30,
            bos_exclude_last: 1,
        }
    }
}

/// Derived, read-only indicator values for the last candle of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub adx: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub volume_ratio: f64,
    pub break_of_structure_up: bool,
    pub break_of_structure_down: bool,
    pub last_close: f64,
    /// `close[-1] / close[-2] - 1`.
    pub last_return: f64,
}

impl IndicatorSnapshot {
    /// Compute the snapshot, or `None` when any indicator lacks data.
    pub fn compute(candles: &[Candle], params: &IndicatorParams) -> Option<Self> {
        if candles.len() < 2 {
            return None;
        }
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let ema_fast = last_ema(&closes, params.ema_fast)?;
        let ema_slow = last_ema(&closes, params.ema_slow)?;
        let rsi = current_rsi(&closes, params.rsi_period)?;
        let adx = calculate_adx(candles, params.adx_period)?;
        let macd = current_macd(&closes, params.macd_fast, params.macd_slow, params.macd_signal)?;

        let volume_ratio = match params.volume_baseline {
            VolumeBaseline::TurnoverEma { span } => {
                let turnover: Vec<f64> = candles.iter().map(|c| c.quote_turnover).collect();
                volume_ratio(&turnover, span)?
            }
            VolumeBaseline::VolumeSma { window } => {
                let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();
                volume_ratio_sma(&volume, window)?
            }
        };

        let bos_up = break_of_structure_up(candles, params.bos_lookback, params.bos_exclude_last)?;
        let bos_down = break_of_structure_down(candles, params.bos_lookback, params.bos_exclude_last)?;

        let last_close = closes[closes.len() - 1];
        let prev_close = closes[closes.len() - 2];
        let last_return = if prev_close.abs() > f64::EPSILON {
            last_close / prev_close - 1.0
        } else {
            0.0
        };

        Some(Self {
            rsi,
            ema_fast,
            ema_slow,
            adx,
            macd_line: macd.line,
            macd_signal: macd.signal,
            volume_ratio,
            break_of_structure_up: bos_up,
            break_of_structure_down: bos_down,
            last_close,
            last_return,
        })
    }

    pub fn trend_up(&self) -> bool {
        self.ema_fast > self.ema_slow
    }
}
