// =============================================================================
// Signals Module
// =============================================================================
//
// Rule-based classification of a single candle series into BUY / SELL / skip,
// with confidence scoring and configurable threshold presets.

pub mod classifier;

pub use classifier::{
    ClassifierConfig, ClassifierPreset, SellVolumeRule, Signal, SignalClassifier, SkipReason,
};
