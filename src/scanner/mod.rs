// =============================================================================
// Scanner Module
// =============================================================================
//
// Run orchestration (bounded fan-out over exchange × symbol × timeframe) and
// the pure aggregation of per-pair outcomes into a ranked result.

pub mod aggregate;
pub mod orchestrator;

pub use orchestrator::{ScanOrchestrator, ScanReport};
