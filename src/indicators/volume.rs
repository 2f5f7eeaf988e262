// =============================================================================
// Volume Ratio — last candle activity versus its recent baseline
// =============================================================================
//
// Two baselines are supported:
//   - EMA baseline: EMA(turnover, span) taken one step before the last candle.
//   - SMA baseline: mean of the `window` values preceding the last candle.
//
// ratio = last / (baseline + eps); > 1 means activity above the baseline.
// =============================================================================

use super::ema::calculate_ema;
use super::EPSILON;

/// Ratio of the last value to the EMA baseline of the previous step.
///
/// Returns `None` when fewer than `span + 1` values are available (the
/// baseline at `n - 2` must exist).
pub fn volume_ratio(values: &[f64], span: usize) -> Option<f64> {
    let n = values.len();
    if span == 0 || n < span + 1 {
        return None;
    }

    let ema = calculate_ema(values, span);
    // ema[j] belongs to input index j + span - 1; we want input index n - 2.
    let baseline = *ema.get(n - 2 - (span - 1))?;
    finite_ratio(values[n - 1], baseline)
}

/// Ratio of the last value to the simple mean of the preceding `window`
/// values.
pub fn volume_ratio_sma(values: &[f64], window: usize) -> Option<f64> {
    let n = values.len();
    if window == 0 || n < window + 1 {
        return None;
    }

    let baseline = values[n - 1 - window..n - 1].iter().sum::<f64>() / window as f64;
    finite_ratio(values[n - 1], baseline)
}

fn finite_ratio(last: f64, baseline: f64) -> Option<f64> {
    let ratio = last / (baseline + EPSILON);
    if ratio.is_finite() {
        Some(ratio)
    } else {
        None
    }
}
