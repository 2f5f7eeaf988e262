// =============================================================================
// Report Module
// =============================================================================
//
// Renders a `ScanReport` as Markdown text and hands it to a sink (Telegram or
// stdout).  Delivery failures are logged and never abort the process.

pub mod format;
pub mod sink;

pub use format::{render, render_failure, ReportConfig};
pub use sink::{deliver, LogSink, ReportSink, TelegramSink};
