// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
// ADX quantifies trend **strength** regardless of direction.
//
// Calculation pipeline:
//   1. Compute +DM (positive directional movement) and -DM per bar.
//   2. Compute True Range (TR) per bar.
//   3. Apply Wilder's smoothing (alpha = 1/period) to +DM, -DM, and TR.
//   4. Derive +DI = 100 * smoothed(+DM) / (smoothed(TR) + eps)
//            -DI = 100 * smoothed(-DM) / (smoothed(TR) + eps)
//   5. DX  = 100 * |+DI - -DI| / (+DI + -DI + eps)
//   6. ADX = Wilder's smoothing of DX.
//
// Interpretation:
//   ADX > 25  => trending market
//   ADX < 20  => ranging / choppy market
// =============================================================================

use super::ema::wilder_smooth;
use super::EPSILON;
use crate::market_data::Candle;

/// Compute the most recent ADX value from a slice of OHLC candles.
///
/// Returns `None` when:
/// - `period` is zero.
/// - There are fewer than `2 * period + 1` candles.
/// - Any intermediate calculation produces a non-finite result.
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }

    // ------------------------------------------------------------------
    // Step 1 & 2: Raw +DM, -DM, and True Range for each consecutive pair
    // ------------------------------------------------------------------
    let bar_count = candles.len() - 1;
    let mut plus_dm = Vec::with_capacity(bar_count);
    let mut minus_dm = Vec::with_capacity(bar_count);
    let mut tr_vals = Vec::with_capacity(bar_count);

    for pair in candles.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);

        let tr = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());

        let up_move = cur.high - prev.high;
        let down_move = prev.low - cur.low;

        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
        tr_vals.push(tr);
    }

    // ------------------------------------------------------------------
    // Step 3-5: Wilder-smoothed DI lines and DX per bar
    // ------------------------------------------------------------------
    let atr = wilder_smooth(&tr_vals, period);
    let plus_sm = wilder_smooth(&plus_dm, period);
    let minus_sm = wilder_smooth(&minus_dm, period);
    if atr.len() != bar_count || plus_sm.len() != bar_count || minus_sm.len() != bar_count {
        return None;
    }

    let mut dx_values = Vec::with_capacity(bar_count);
    for i in 0..bar_count {
        dx_values.push(compute_dx(plus_sm[i], minus_sm[i], atr[i])?);
    }

    // ------------------------------------------------------------------
    // Step 6: ADX = Wilder's smoothing of DX
    // ------------------------------------------------------------------
    let adx = *wilder_smooth(&dx_values, period).last()?;
    if adx.is_finite() {
        Some(adx.clamp(0.0, 100.0))
    } else {
        None
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Compute DX from smoothed +DM, -DM, and TR values.
fn compute_dx(smooth_plus_dm: f64, smooth_minus_dm: f64, smooth_tr: f64) -> Option<f64> {
    let plus_di = 100.0 * smooth_plus_dm / (smooth_tr + EPSILON);
    let minus_di = 100.0 * smooth_minus_dm / (smooth_tr + EPSILON);

    let dx = 100.0 * (plus_di - minus_di).abs() / (plus_di + minus_di + EPSILON);
    if dx.is_finite() {
        Some(dx)
    } else {
        None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 1.0, 1.0)
    }

    #[test]
    fn adx_period_zero() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5); 50];
        assert!(calculate_adx(&candles, 0).is_none());
    }

    #[test]
    fn adx_insufficient_data() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5); 10];
        assert!(calculate_adx(&candles, 14).is_none());
    }

    #[test]
    fn adx_strong_uptrend() {
        let candles: Vec<Candle> = (0..80)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                candle(base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect();

        let value = calculate_adx(&candles, 14).unwrap();
        assert!(value > 25.0, "expected ADX > 25 for strong trend, got {value}");
    }

    #[test]
    fn adx_flat_market() {
        let candles = vec![candle(100.0, 101.0, 99.0, 100.0); 60];
        let value = calculate_adx(&candles, 14).unwrap();
        assert!(value < 1.0, "expected ADX near 0 for flat market, got {value}");
    }

    #[test]
    fn adx_zero_range_candles_do_not_divide_by_zero() {
        let candles = vec![candle(100.0, 100.0, 100.0, 100.0); 40];
        let value = calculate_adx(&candles, 14).unwrap();
        assert!(value.abs() < 1e-9);
    }

    #[test]
    fn adx_result_range() {
        let candles: Vec<Candle> = (0..150)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                candle(base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let value = calculate_adx(&candles, 14).unwrap();
        assert!((0.0..=100.0).contains(&value), "ADX {value} out of range");
    }

    #[test]
    fn adx_minimum_candles_exact() {
        let period = 5;
        let min = 2 * period + 1;
        let candles: Vec<Candle> = (0..min)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 1.0, base - 0.5, base + 0.5)
            })
            .collect();
        assert!(calculate_adx(&candles, period).is_some());
        assert!(calculate_adx(&candles[..min - 1], period).is_none());
    }
}
