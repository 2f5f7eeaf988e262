// =============================================================================
// Signal Scanner — Main Entry Point
// =============================================================================
//
// One scan per invocation: load and freeze the configuration, build one REST
// client per configured exchange, snapshot market caps, run the scan, then
// publish the report to Telegram (or stdout when no bot is configured).
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod candidates;
mod error;
mod exchange;
mod indicators;
mod market_data;
mod market_intel;
mod orderflow;
mod regime;
mod report;
mod runtime_config;
mod scanner;
mod signals;
mod types;

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ScanError;
use crate::exchange::SpotRestClient;
use crate::market_data::MarketDataProvider;
use crate::market_intel::{CoinGeckoClient, GlobalMarketSource, MarketCapBook};
use crate::report::{LogSink, ReportSink, TelegramSink};
use crate::runtime_config::ScanConfig;
use crate::scanner::ScanOrchestrator;

const CONFIG_PATH: &str = "scanner_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ScanConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ScanConfig::default()
    });
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    let config = Arc::new(config);

    info!(
        universes = ?config.universes,
        timeframes = ?config.timeframes,
        max_concurrency = config.max_concurrency,
        guard = config.regime.guard_enabled,
        "Scanner configured"
    );

    // ── 2. Report sink ───────────────────────────────────────────────────
    let http_timeout = Duration::from_secs(config.http_timeout_secs);
    let sink: Box<dyn ReportSink> = match (std::env::var("TELEGRAM_TOKEN"), std::env::var("CHAT_ID")) {
        (Ok(token), Ok(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
            Box::new(TelegramSink::new(token, chat_id, http_timeout)?)
        }
        _ => {
            info!("TELEGRAM_TOKEN / CHAT_ID not set, report goes to stdout");
            Box::new(LogSink)
        }
    };

    // ── 3. Market data providers ─────────────────────────────────────────
    let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();
    for universe in &config.universes {
        let client = SpotRestClient::new(
            universe.exchange,
            http_timeout,
            config.retry.clone(),
            config.weight_limits.clone(),
        )?;
        providers.push(Arc::new(client));
    }
    if config.candidates.enabled
        && !providers.iter().any(|p| p.exchange() == config.candidates.exchange)
    {
        providers.push(Arc::new(SpotRestClient::new(
            config.candidates.exchange,
            http_timeout,
            config.retry.clone(),
            config.weight_limits.clone(),
        )?));
    }

    // ── 4. Global market intelligence ────────────────────────────────────
    let coingecko = CoinGeckoClient::new(http_timeout, config.retry.clone(), config.market_cap_pages)?;
    let market_caps = coingecko
        .fetch_market_caps(MarketCapBook::new(config.market_cap_bounds.clone()))
        .await;
    if market_caps.is_empty() {
        warn!("Market-cap snapshot empty, every coin uses the UNKNOWN thresholds");
    } else {
        info!(coins = market_caps.len(), "Market-cap snapshot ready");
    }
    let global: Arc<dyn GlobalMarketSource> = Arc::new(coingecko);

    // ── 5. Scan ──────────────────────────────────────────────────────────
    let orchestrator = ScanOrchestrator::new(
        Arc::clone(&config),
        providers,
        global,
        Arc::new(market_caps),
    );

    let text = match orchestrator.run().await {
        Ok(scan) => report::render(&scan, &config.report),
        Err(e @ ScanError::EmptyUniverse) => {
            error!(error = %e, "Scan aborted");
            report::render_failure(&config.report, &e.to_string())
        }
        Err(e) => return Err(e.into()),
    };

    // ── 6. Publish ───────────────────────────────────────────────────────
    report::deliver(sink.as_ref(), &text).await;

    Ok(())
}
