// =============================================================================
// Regime Detection Module
// =============================================================================
//
// Run-wide market regime: reference-asset trend per timeframe plus global
// market aggregates, yielding the BUY-suppression guard and advisory notes.

pub mod detector;

pub use detector::{RegimeClassifier, RegimeConfig, RegimeState};
