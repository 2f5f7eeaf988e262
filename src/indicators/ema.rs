// =============================================================================
// Exponential Moving Average (EMA) and Wilder smoothing
// =============================================================================
//
// EMA gives more weight to recent values, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   k     = 2 / (span + 1)
//   EMA_t = x_t * k + EMA_{t-1} * (1 - k)
//
// Two seeding conventions are provided:
//   - `calculate_ema`            seeds with the SMA of the first `span` values.
//   - `calculate_ema_from_first` seeds with the first value; used for chains
//     whose source itself starts mid-series (the MACD signal line).
//
// Wilder smoothing is the same recursion with alpha = 1 / period, seeded with
// the first value.  RSI and ADX both run on it.
// =============================================================================

/// Compute the EMA series for `values` with look-back `span`.
///
/// Returns an empty `Vec` when the input is too short or the span is zero.
/// Each output element corresponds to an input starting at index `span - 1`.
///
/// # Edge cases
/// - `span == 0` => empty vec
/// - `values.len() < span` => empty vec
/// - A non-finite intermediate value truncates the series.
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.len() < span {
        return Vec::new();
    }

    let k = 2.0 / (span + 1) as f64;

    // Seed: SMA of the first `span` values.
    let sma: f64 = values[..span].iter().sum::<f64>() / span as f64;
    if !sma.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len() - span + 1);
    result.push(sma);
    extend_recursive(&mut result, &values[span..], sma, k);
    result
}

/// Compute the EMA series for `values` seeded with the first element.
///
/// The output has the same length as the input.  Empty when `span == 0` or
/// the input is empty.
pub fn calculate_ema_from_first(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return Vec::new();
    }
    smooth_from_first(values, 2.0 / (span + 1) as f64)
}

/// Wilder smoothing (alpha = 1 / period) seeded with the first element.
///
/// The output has the same length as the input.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return Vec::new();
    }
    smooth_from_first(values, 1.0 / period as f64)
}

/// Last EMA value of `values` for `span`, if computable.
pub fn last_ema(values: &[f64], span: usize) -> Option<f64> {
    calculate_ema(values, span).last().copied()
}

// =============================================================================
// Internal helpers
// =============================================================================

fn smooth_from_first(values: &[f64], alpha: f64) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    if !first.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len());
    result.push(first);
    extend_recursive(&mut result, &values[1..], first, alpha);
    result
}

fn extend_recursive(out: &mut Vec<f64>, rest: &[f64], seed: f64, alpha: f64) {
    let mut prev = seed;
    for &x in rest {
        let next = x * alpha + prev * (1.0 - alpha);
        if !next.is_finite() {
            // Downstream consumers should not trust a broken series.
            break;
        }
        out.push(next);
        prev = next;
    }
}
