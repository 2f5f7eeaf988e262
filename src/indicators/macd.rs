// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   line      = EMA(fast) - EMA(slow)
//   signal    = EMA(line, signal_span)
//   histogram = line - signal
//
// The fast and slow EMAs are SMA-seeded and aligned on the slow EMA's first
// value.  The line therefore starts mid-series, so the signal EMA is seeded
// with the first line value.
// =============================================================================

use super::ema::{calculate_ema, calculate_ema_from_first};

/// Full MACD series, all three vectors aligned on the same candles (the
/// last element of each belongs to the last close).
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD values for the most recent close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Compute the MACD series.
///
/// Returns `None` when `fast >= slow`, any span is zero, or there are fewer
/// than `slow + signal_span` closes (the signal line needs a warm-up).
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_span: usize,
) -> Option<MacdSeries> {
    if fast == 0 || slow == 0 || signal_span == 0 || fast >= slow {
        return None;
    }
    if closes.len() < slow + signal_span {
        return None;
    }

    let fast_ema = calculate_ema(closes, fast);
    let slow_ema = calculate_ema(closes, slow);
    if slow_ema.is_empty() {
        return None;
    }

    // fast_ema[j] belongs to close index j + fast - 1; skip to the slow start.
    let offset = slow - fast;
    if fast_ema.len() < offset + slow_ema.len() {
        return None;
    }
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();

    let signal = calculate_ema_from_first(&line, signal_span);
    if signal.len() != line.len() {
        return None;
    }
    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

    Some(MacdSeries {
        line,
        signal,
        histogram,
    })
}

/// MACD values at the last close.
pub fn current_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_span: usize,
) -> Option<MacdValue> {
    let series = calculate_macd(closes, fast, slow, signal_span)?;
    Some(MacdValue {
        line: *series.line.last()?,
        signal: *series.signal.last()?,
        histogram: *series.histogram.last()?,
    })
}
