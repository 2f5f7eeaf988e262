// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the technical indicators used by
// the signal classifier and the regime detector.  Every public function
// returns `Option<T>` (or an empty series) so callers are forced to handle
// insufficient-data scenarios as "skip", never "retry later".

pub mod adx;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod snapshot;
pub mod structure;
pub mod volume;

pub use snapshot::{IndicatorParams, IndicatorSnapshot, VolumeBaseline};
pub use structure::StructureBreak;

/// Guard added to denominators that may legitimately be zero.
pub const EPSILON: f64 = 1e-12;
