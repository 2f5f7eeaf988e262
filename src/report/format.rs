// =============================================================================
// Report Formatter — ScanReport to Markdown text
// =============================================================================
//
// Layout:
//
//   ⚡ *title*
//   ⏱ timestamp | ⏳ elapsed
//   🌐 per-exchange universe sizes | total pairs
//   🛡️ average confidence
//   🧭 guard status
//   regime note
//
//   📈 *Signals*        BUY lines, then SELL lines (already ranked/truncated)
//   🐋 *Order flow*     long / short / accumulation candidates
//   📊 summary          signal counts and skips by reason
//
// A run without signals still says so explicitly.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::candidates::SymbolStats;
use crate::scanner::ScanReport;
use crate::signals::Signal;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    /// Funding is printed only when |rate| exceeds this.
    pub funding_note_threshold: f64,
    pub show_candidates: bool,
    /// Trend arrow, break-of-structure arrow and last price on signal lines.
    pub show_signal_details: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Signal Scanner".to_string(),
            funding_note_threshold: 0.01,
            show_candidates: true,
            show_signal_details: true,
        }
    }
}

/// Render the full report.
pub fn render(report: &ScanReport, config: &ReportConfig) -> String {
    let mut lines: Vec<String> = Vec::new();
    let agg = &report.signals;

    let timeframes: Vec<String> = report.timeframes.iter().map(|t| t.to_uppercase()).collect();
    lines.push(format!("⚡ *{} — {}*", config.title, timeframes.join("/")));
    lines.push(format!(
        "⏱ {} | ⏳ Elapsed: {}s",
        report.started_at.format("%Y-%m-%d %H:%M UTC"),
        report.elapsed_secs as u64
    ));

    let mut universe: Vec<String> = report
        .universe
        .iter()
        .map(|u| format!("{}:{}", u.exchange, u.symbols))
        .collect();
    universe.push(format!("Total: {} pairs", report.total_pairs));
    lines.push(format!("🌐 {}", universe.join(" | ")));

    lines.push(format!("🛡️ Avg confidence: {}/100", agg.average_confidence));
    lines.push(if report.regime.buy_suppressed {
        format!("🧭 Guard: ACTIVE — BUY suppressed ({} dropped)", agg.suppressed_buys)
    } else {
        "🧭 Guard: PASSIVE".to_string()
    });
    lines.push(report.regime.note());

    if agg.buys.is_empty() && agg.sells.is_empty() {
        lines.push("\nℹ️ No signals met the criteria.".to_string());
    } else {
        lines.push("\n📈 *Signals*".to_string());
        if !agg.buys.is_empty() {
            lines.push("🟢 *BUY:*".to_string());
            lines.extend(agg.buys.iter().map(|s| signal_line(s, config)));
        }
        if !agg.sells.is_empty() {
            lines.push("🔴 *SELL:*".to_string());
            lines.extend(agg.sells.iter().map(|s| signal_line(s, config)));
        }
    }

    if config.show_candidates {
        if let Some(set) = report.candidates.as_ref().filter(|c| !c.is_empty()) {
            lines.push("\n🐋 *Order flow*".to_string());
            for (label, bucket) in [
                ("Long", &set.longs),
                ("Short", &set.shorts),
                ("Accumulation", &set.accumulation),
            ] {
                if !bucket.is_empty() {
                    lines.push(format!("{label}:"));
                    lines.extend(bucket.iter().map(candidate_line));
                }
            }
        }
    }

    let mut summary = format!(
        "\n📊 Summary: BUY:{} | SELL:{}",
        agg.buys.len(),
        agg.sells.len()
    );
    if agg.total_skips() > 0 {
        let skips: Vec<String> = agg
            .skips
            .iter()
            .map(|(reason, n)| format!("{reason}:{n}"))
            .collect();
        let _ = write!(summary, " | Skipped ({})", skips.join(", "));
    }
    lines.push(summary);

    lines.join("\n")
}

/// Short message published when a run cannot produce a report at all.
pub fn render_failure(config: &ReportConfig, reason: &str) -> String {
    format!("⛔ *{}*: {reason}", config.title)
}

/// `- [EX] SYM | TF | Trend:↑ | Conf:N | RSI:x | ADX:y | Vol xz | BoS:↑ | Px:p[ | Funding:f]`
fn signal_line(s: &Signal, config: &ReportConfig) -> String {
    let mut line = format!("- [{}] {} | {}", s.exchange, s.symbol, s.timeframe.to_uppercase());
    if config.show_signal_details {
        let _ = write!(line, " | Trend:{}", s.trend.arrow());
    }
    let _ = write!(
        line,
        " | Conf:{} | RSI:{:.1} | ADX:{:.0} | Vol x{:.2}",
        s.confidence, s.rsi, s.adx, s.volume_ratio
    );
    if config.show_signal_details {
        let _ = write!(
            line,
            " | BoS:{} | Px:{}",
            s.structure_break.arrow(),
            format_price(s.last_price)
        );
    }
    if let Some(fr) = s.funding_rate {
        if fr > config.funding_note_threshold {
            let _ = write!(line, " | Funding:+{fr:.3}");
        } else if fr < -config.funding_note_threshold {
            let _ = write!(line, " | Funding:{fr:.3}");
        }
    }
    line
}

/// More decimals for cheaper coins.
fn format_price(p: f64) -> String {
    if p >= 1_000.0 {
        format!("{p:.2}")
    } else if p >= 1.0 {
        format!("{p:.4}")
    } else {
        format!("{p:.6}")
    }
}

fn candidate_line(s: &SymbolStats) -> String {
    let mut line = format!(
        "- {} | {} | Δ {} | 24h {:+.1}% | {}",
        s.symbol,
        s.trend_tag,
        compact_usd(s.net_delta),
        s.pct_change_24h,
        s.cap_class
    );
    for whale in [&s.buy_whale, &s.sell_whale].into_iter().flatten() {
        let _ = write!(
            line,
            " | 🐳{} {} {}",
            whale.tier,
            whale.side,
            compact_usd(whale.notional)
        );
    }
    line
}

/// 680000 -> "+680k", -1500000 -> "-1.50M".
fn compact_usd(v: f64) -> String {
    let sign = if v < 0.0 { "-" } else { "+" };
    let a = v.abs();
    if a >= 1_000_000.0 {
        format!("{sign}{:.2}M", a / 1_000_000.0)
    } else if a >= 1_000.0 {
        format!("{sign}{:.0}k", a / 1_000.0)
    } else {
        format!("{sign}{a:.0}")
    }
}
