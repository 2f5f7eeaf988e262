// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Clip into gains (d > 0) and losses (-d for d < 0).
// Step 3 — Smooth both with alpha = 1/period, seeded with the first delta.
// Step 4 — RS  = avg_gain / (avg_loss + 1e-12)
//          RSI = 100 - 100 / (1 + RS)
//
// A perfectly flat series has no gains and no losses; it reports 50.
// =============================================================================

use super::ema::wilder_smooth;
use super::EPSILON;

/// Compute the full RSI series for `closes` and `period`.
///
/// One RSI value per delta, i.e. `closes.len() - 1` values.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period + 1` => empty vec
/// - Non-finite results truncate the series.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|&d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|&d| (-d).max(0.0)).collect();

    let avg_gain = wilder_smooth(&gains, period);
    let avg_loss = wilder_smooth(&losses, period);

    let mut result = Vec::with_capacity(deltas.len());
    for (&g, &l) in avg_gain.iter().zip(avg_loss.iter()) {
        match rsi_from_averages(g, l) {
            Some(rsi) => result.push(rsi),
            None => break,
        }
    }
    result
}

/// Most recent RSI value, if computable.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<f64> {
    calculate_rsi(closes, period).last().copied()
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_gain == 0.0 && avg_loss == 0.0 {
        50.0
    } else {
        let rs = avg_gain / (avg_loss + EPSILON);
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi.clamp(0.0, 100.0))
    } else {
        None
    }
}
