// =============================================================================
// Scan Aggregation
// =============================================================================
//
// Folds per-pair outcomes into the run result:
//
//   1. count every skip by reason,
//   2. drop BUY signals when the regime guard is active (counted separately),
//   3. split by side, stable-sort by confidence descending, truncate.
//
// The average confidence covers every surviving signal, before truncation.
// Order of outcomes only matters for ties, which keep input order.
// =============================================================================

use serde::Serialize;
use std::collections::BTreeMap;

use crate::regime::RegimeState;
use crate::signals::{Signal, SkipReason};
use crate::types::Side;

/// Outcome of one (exchange, symbol, timeframe) task.
pub type PairOutcome = Result<Signal, SkipReason>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregation {
    pub buys: Vec<Signal>,
    pub sells: Vec<Signal>,
    /// BUY signals removed by the regime guard.
    pub suppressed_buys: usize,
    /// Signals that survived the guard, before truncation.
    pub eligible_signals: usize,
    /// Floor of the mean confidence of eligible signals; 0 when none.
    pub average_confidence: u8,
    pub skips: BTreeMap<SkipReason, usize>,
}

impl Aggregation {
    #[cfg(test)]
    pub fn skip_count(&self, reason: SkipReason) -> usize {
        self.skips.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skips(&self) -> usize {
        self.skips.values().sum()
    }
}

pub fn aggregate(
    outcomes: impl IntoIterator<Item = PairOutcome>,
    regime: &RegimeState,
    max_per_side: usize,
) -> Aggregation {
    let mut agg = Aggregation::default();
    let mut confidence_sum: u64 = 0;

    for outcome in outcomes {
        let signal = match outcome {
            Ok(signal) => signal,
            Err(reason) => {
                *agg.skips.entry(reason).or_insert(0) += 1;
                continue;
            }
        };

        if !regime.admits(signal.side) {
            agg.suppressed_buys += 1;
            continue;
        }

        agg.eligible_signals += 1;
        confidence_sum += u64::from(signal.confidence);
        match signal.side {
            Side::Buy => agg.buys.push(signal),
            Side::Sell => agg.sells.push(signal),
        }
    }

    if agg.eligible_signals > 0 {
        agg.average_confidence = (confidence_sum / agg.eligible_signals as u64) as u8;
    }

    for side in [&mut agg.buys, &mut agg.sells] {
        side.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        side.truncate(max_per_side);
    }

    agg
}
