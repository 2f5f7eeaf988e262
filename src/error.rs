// =============================================================================
// Run-level errors
// =============================================================================
//
// Per-pair problems never surface here; they become a `SkipReason` on the
// pair's outcome.  Only conditions that make the whole run meaningless do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no symbols could be listed on any configured exchange")]
    EmptyUniverse,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
