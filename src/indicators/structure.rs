// =============================================================================
// Break of Structure (BOS)
// =============================================================================
//
// The last close breaks structure up when it strictly exceeds the highest
// high of the `lookback` candles that precede the most recent
// `exclude_last` candles; down when it is strictly below their lowest low.
// Equality is not a break.

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

/// Which side (if any) the last close broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureBreak {
    Up,
    Down,
    None,
}

impl StructureBreak {
    /// An up break wins when both checks fire.
    pub fn from_flags(up: bool, down: bool) -> Self {
        if up {
            Self::Up
        } else if down {
            Self::Down
        } else {
            Self::None
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
            Self::None => "-",
        }
    }
}

/// Reference window for a break check, or `None` when the series is too
/// short to supply `lookback` candles before the excluded tail.
fn reference_window(candles: &[Candle], lookback: usize, exclude_last: usize) -> Option<&[Candle]> {
    if lookback == 0 || candles.len() < lookback + exclude_last {
        return None;
    }
    let end = candles.len() - exclude_last;
    Some(&candles[end - lookback..end])
}

pub fn break_of_structure_up(candles: &[Candle], lookback: usize, exclude_last: usize) -> Option<bool> {
    let window = reference_window(candles, lookback, exclude_last)?;
    let highest = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    Some(candles.last()?.close > highest)
}

pub fn break_of_structure_down(candles: &[Candle], lookback: usize, exclude_last: usize) -> Option<bool> {
    let window = reference_window(candles, lookback, exclude_last)?;
    let lowest = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    Some(candles.last()?.close < lowest)
}
