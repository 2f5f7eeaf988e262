// =============================================================================
// Scan Orchestrator — one full multi-exchange, multi-timeframe run
// =============================================================================
//
// Run phases:
//
//   1. Regime + universe (concurrently): reference-asset trends and global
//      stats; the most liquid symbols of every configured exchange.  An empty
//      universe across all exchanges is the only fatal outcome.
//   2. Classification fan-out: one tokio task per (exchange, symbol,
//      timeframe).  Each task waits for a semaphore permit, then fetches and
//      classifies under a timeout.  Outcomes are collected in submission
//      order; a failed or panicked task becomes a skip.
//   3. Aggregation: regime gate, per-side ranking, truncation.
//   4. Funding annotation of the surviving signals (when configured).
//   5. Order-flow pass: trade tapes + hourly candles of the order-flow venue's
//      most liquid symbols, ranked into long / short / accumulation buckets.
//      The phase-1 listing is reused when it already covers the venue.
//
// Tasks share only `Arc`s of immutable state.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::aggregate::{aggregate, Aggregation, PairOutcome};
use crate::candidates::{CandidateRanker, CandidateSet, SymbolStats, TrendTag};
use crate::error::ScanError;
use crate::indicators::ema::last_ema;
use crate::market_data::{Candle, MarketDataProvider, SeriesContext, Trade};
use crate::market_intel::{GlobalMarketSource, MarketCapBook};
use crate::orderflow::OrderflowAnalyzer;
use crate::regime::{RegimeClassifier, RegimeState};
use crate::runtime_config::ScanConfig;
use crate::signals::{Signal, SignalClassifier, SkipReason};
use crate::types::Exchange;

/// Timeframe of the candles used for order-flow trend and 24h change.
const ORDERFLOW_TIMEFRAME: &str = "1h";
const ORDERFLOW_CANDLES: usize = 100;
/// Hourly bars in a day.
const BARS_PER_DAY: usize = 24;

// =============================================================================
// Report types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UniverseSize {
    pub exchange: Exchange,
    pub symbols: usize,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub universe: Vec<UniverseSize>,
    pub timeframes: Vec<String>,
    /// (exchange, symbol, timeframe) pairs submitted.
    pub total_pairs: usize,
    pub regime: RegimeState,
    #[serde(flatten)]
    pub signals: Aggregation,
    pub candidates: Option<CandidateSet>,
}

// =============================================================================
// ScanOrchestrator
// =============================================================================

pub struct ScanOrchestrator {
    config: Arc<ScanConfig>,
    providers: Vec<Arc<dyn MarketDataProvider>>,
    global: Arc<dyn GlobalMarketSource>,
    market_caps: Arc<MarketCapBook>,
}

impl ScanOrchestrator {
    pub fn new(
        config: Arc<ScanConfig>,
        providers: Vec<Arc<dyn MarketDataProvider>>,
        global: Arc<dyn GlobalMarketSource>,
        market_caps: Arc<MarketCapBook>,
    ) -> Self {
        Self {
            config,
            providers,
            global,
            market_caps,
        }
    }

    fn provider_for(&self, exchange: Exchange) -> Option<&Arc<dyn MarketDataProvider>> {
        self.providers.iter().find(|p| p.exchange() == exchange)
    }

    /// Execute one scan run inside a span carrying a fresh run id.
    pub async fn run(&self) -> Result<ScanReport, ScanError> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id)
            .instrument(info_span!("scan", %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<ScanReport, ScanError> {
        let cfg = &self.config;
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(timeframes = ?cfg.timeframes, "scan started");

        // ── 1. Regime and universe ──────────────────────────────────────
        let (regime, universe) = tokio::join!(self.assess_regime(), self.list_universe());

        let universe_sizes: Vec<UniverseSize> = universe
            .iter()
            .map(|(p, symbols)| UniverseSize {
                exchange: p.exchange(),
                symbols: symbols.len(),
            })
            .collect();

        if universe.iter().all(|(_, symbols)| symbols.is_empty()) {
            error!("no symbols listed on any exchange, aborting run");
            return Err(ScanError::EmptyUniverse);
        }

        // ── 2. Classification fan-out ───────────────────────────────────
        let outcomes = self.classify_all(&universe).await;
        let total_pairs = outcomes.len();

        // ── 3. Aggregation ──────────────────────────────────────────────
        let mut signals = aggregate(outcomes, &regime, cfg.max_lines_per_side);

        // ── 4. Funding annotation ───────────────────────────────────────
        if cfg.classifier.annotate_funding {
            self.annotate_funding(&mut signals.buys).await;
            self.annotate_funding(&mut signals.sells).await;
        }

        // ── 5. Order-flow candidates ────────────────────────────────────
        let candidates = if cfg.candidates.enabled {
            self.orderflow_pass(&universe).await
        } else {
            None
        };

        let elapsed_secs = clock.elapsed().as_secs_f64();
        info!(
            pairs = total_pairs,
            buys = signals.buys.len(),
            sells = signals.sells.len(),
            suppressed_buys = signals.suppressed_buys,
            skipped = signals.total_skips(),
            elapsed_secs,
            "scan complete"
        );

        Ok(ScanReport {
            run_id,
            started_at,
            elapsed_secs,
            universe: universe_sizes,
            timeframes: cfg.timeframes.clone(),
            total_pairs,
            regime,
            signals,
            candidates,
        })
    }

    // -------------------------------------------------------------------------
    // Phase 1
    // -------------------------------------------------------------------------

    async fn assess_regime(&self) -> RegimeState {
        let classifier = RegimeClassifier::new(self.config.regime.clone());
        let reference = self
            .provider_for(self.config.regime.reference_exchange)
            .or_else(|| self.providers.first());

        match reference {
            Some(provider) => classifier.assess(provider.as_ref(), self.global.as_ref()).await,
            None => {
                warn!("no provider for the reference asset, regime treated as neutral");
                classifier.evaluate(Vec::new(), &self.global.global_market_stats().await)
            }
        }
    }

    async fn list_universe(&self) -> Vec<(Arc<dyn MarketDataProvider>, Vec<String>)> {
        let cfg = &self.config;
        let mut universe = Vec::with_capacity(cfg.universes.len());

        for u in &cfg.universes {
            let Some(provider) = self.provider_for(u.exchange) else {
                warn!(exchange = %u.exchange, "no provider configured for exchange");
                continue;
            };
            let symbols = match provider.list_liquid_symbols(&cfg.quote_asset, u.limit).await {
                Ok(symbols) => symbols,
                Err(e) => {
                    warn!(exchange = %u.exchange, error = %e, "symbol listing failed");
                    Vec::new()
                }
            };
            info!(exchange = %u.exchange, symbols = symbols.len(), "universe listed");
            universe.push((Arc::clone(provider), symbols));
        }
        universe
    }

    // -------------------------------------------------------------------------
    // Phase 2
    // -------------------------------------------------------------------------

    async fn classify_all(
        &self,
        universe: &[(Arc<dyn MarketDataProvider>, Vec<String>)],
    ) -> Vec<PairOutcome> {
        let cfg = &self.config;
        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrency));
        let classifier = Arc::new(SignalClassifier::new(cfg.classifier.clone()));
        let task_timeout = Duration::from_secs(cfg.task_timeout_secs);

        let mut handles = Vec::new();
        for (provider, symbols) in universe {
            for symbol in symbols {
                for timeframe in &cfg.timeframes {
                    let semaphore = Arc::clone(&semaphore);
                    let classifier = Arc::clone(&classifier);
                    let provider = Arc::clone(provider);
                    let symbol = symbol.clone();
                    let timeframe = timeframe.clone();
                    let limit = cfg.candle_limit;

                    let task = async move {
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return Err(SkipReason::TaskFailed);
                        };
                        let work = classify_pair(
                            provider.as_ref(),
                            &classifier,
                            &symbol,
                            &timeframe,
                            limit,
                        );
                        match timeout(task_timeout, work).await {
                            Ok(outcome) => outcome,
                            Err(_) => {
                                warn!(
                                    exchange = %provider.exchange(),
                                    symbol = %symbol,
                                    timeframe = %timeframe,
                                    "classification timed out"
                                );
                                Err(SkipReason::TimedOut)
                            }
                        }
                    };
                    handles.push(tokio::spawn(task.in_current_span()));
                }
            }
        }

        debug!(tasks = handles.len(), "classification tasks submitted");

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "classification task failed");
                    Err(SkipReason::TaskFailed)
                }
            });
        }
        outcomes
    }

    // -------------------------------------------------------------------------
    // Phase 4
    // -------------------------------------------------------------------------

    /// Attach funding rates, one lookup per (exchange, symbol).
    async fn annotate_funding(&self, signals: &mut [Signal]) {
        let mut rates: HashMap<(Exchange, String), Option<f64>> = HashMap::new();
        for s in signals.iter() {
            rates.entry((s.exchange, s.symbol.clone())).or_insert(None);
        }

        let mut handles = Vec::with_capacity(rates.len());
        for (exchange, symbol) in rates.keys() {
            let Some(provider) = self.provider_for(*exchange) else {
                continue;
            };
            let provider = Arc::clone(provider);
            let key = (*exchange, symbol.clone());
            handles.push(tokio::spawn(
                async move {
                    let rate = provider.funding_rate(&key.1).await;
                    (key, rate)
                }
                .in_current_span(),
            ));
        }

        for handle in handles {
            match handle.await {
                Ok((key, rate)) => {
                    rates.insert(key, rate);
                }
                Err(e) => warn!(error = %e, "funding lookup task failed"),
            }
        }

        for s in signals.iter_mut() {
            s.funding_rate = rates
                .get(&(s.exchange, s.symbol.clone()))
                .copied()
                .flatten();
        }
    }

    // -------------------------------------------------------------------------
    // Phase 5
    // -------------------------------------------------------------------------

    /// Symbols of the order-flow venue: the phase-1 listing truncated to the
    /// candidate limit when that listing was requested at least as deep,
    /// otherwise a fresh listing.
    async fn orderflow_symbols(
        &self,
        provider: &dyn MarketDataProvider,
        universe: &[(Arc<dyn MarketDataProvider>, Vec<String>)],
    ) -> Option<Vec<String>> {
        let cfg = &self.config;
        let exchange = cfg.candidates.exchange;
        let limit = cfg.candidates.symbol_limit;

        let listed_deep_enough = cfg
            .universes
            .iter()
            .any(|u| u.exchange == exchange && u.limit >= limit);
        if listed_deep_enough {
            if let Some((_, symbols)) = universe
                .iter()
                .find(|(p, symbols)| p.exchange() == exchange && !symbols.is_empty())
            {
                debug!(exchange = %exchange, "order-flow pass reuses the phase-1 listing");
                return Some(symbols.iter().take(limit).cloned().collect());
            }
        }

        match provider.list_liquid_symbols(&cfg.quote_asset, limit).await {
            Ok(symbols) => Some(symbols),
            Err(e) => {
                warn!(error = %e, "order-flow universe unavailable, skipping candidates");
                None
            }
        }
    }

    async fn orderflow_pass(
        &self,
        universe: &[(Arc<dyn MarketDataProvider>, Vec<String>)],
    ) -> Option<CandidateSet> {
        let cfg = &self.config;
        let Some(provider) = self.provider_for(cfg.candidates.exchange) else {
            warn!(exchange = %cfg.candidates.exchange, "no provider for order-flow pass");
            return None;
        };

        let symbols = self.orderflow_symbols(provider.as_ref(), universe).await?;

        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrency));
        let analyzer = Arc::new(OrderflowAnalyzer::new(cfg.orderflow.clone()));
        let task_timeout = Duration::from_secs(cfg.task_timeout_secs);
        let trade_limit = cfg.orderflow.trade_limit;
        let flat_band = cfg.candidates.flat_band_pct;

        let mut handles = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let semaphore = Arc::clone(&semaphore);
            let analyzer = Arc::clone(&analyzer);
            let provider = Arc::clone(provider);
            let book = Arc::clone(&self.market_caps);

            let task = async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                let fetch = async {
                    tokio::join!(
                        provider.get_trades(&symbol, trade_limit),
                        provider.get_candles(&symbol, ORDERFLOW_TIMEFRAME, ORDERFLOW_CANDLES),
                    )
                };
                let (trades, candles) = match timeout(task_timeout, fetch).await {
                    Ok((Ok(trades), Ok(candles))) => (trades, candles),
                    Ok((Err(e), _)) | Ok((_, Err(e))) => {
                        debug!(symbol = %symbol, error = %e, "order-flow fetch failed");
                        return None;
                    }
                    Err(_) => {
                        warn!(symbol = %symbol, "order-flow fetch timed out");
                        return None;
                    }
                };
                symbol_stats(
                    provider.exchange(),
                    &symbol,
                    &trades,
                    &candles,
                    &analyzer,
                    &book,
                    flat_band,
                )
            };
            handles.push(tokio::spawn(task.in_current_span()));
        }

        let mut stats = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(s)) => stats.push(s),
                Ok(None) => {}
                Err(e) => error!(error = %e, "order-flow task failed"),
            }
        }

        let ranker = CandidateRanker::new(cfg.candidates.clone(), cfg.orderflow.net_delta);
        let set = ranker.select(&stats);
        info!(
            examined = stats.len(),
            longs = set.longs.len(),
            shorts = set.shorts.len(),
            accumulation = set.accumulation.len(),
            "order-flow candidates ranked"
        );
        Some(set)
    }
}

// =============================================================================
// Per-task helpers
// =============================================================================

async fn classify_pair(
    provider: &dyn MarketDataProvider,
    classifier: &SignalClassifier,
    symbol: &str,
    timeframe: &str,
    limit: usize,
) -> PairOutcome {
    let candles = match provider.get_candles(symbol, timeframe, limit).await {
        Ok(candles) => candles,
        Err(e) => {
            debug!(symbol, timeframe, error = %e, "candle fetch failed");
            return Err(SkipReason::FetchFailed);
        }
    };
    let ctx = SeriesContext::new(provider.exchange(), symbol, timeframe, candles);
    classifier.classify(&ctx)
}

/// Order-flow statistics for one symbol; `None` when the hourly series is
/// too short for EMA50 or a 24h change.
pub fn symbol_stats(
    exchange: Exchange,
    symbol: &str,
    trades: &[Trade],
    candles: &[Candle],
    analyzer: &OrderflowAnalyzer,
    book: &MarketCapBook,
    flat_band_pct: f64,
) -> Option<SymbolStats> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema20 = last_ema(&closes, 20)?;
    let ema50 = last_ema(&closes, 50)?;
    let last_price = *closes.last()?;
    if closes.len() <= BARS_PER_DAY {
        return None;
    }
    let day_ago = closes[closes.len() - 1 - BARS_PER_DAY];
    if day_ago <= 0.0 {
        return None;
    }

    let cap_class = book.classify(symbol);
    let flow = analyzer.analyze(trades, cap_class);

    Some(SymbolStats {
        exchange,
        symbol: symbol.to_string(),
        trend_tag: TrendTag::from_emas(ema20, ema50, flat_band_pct),
        net_delta: flow.net_delta,
        buy_whale: flow.buy_whale,
        sell_whale: flow.sell_whale,
        pct_change_24h: (last_price / day_ago - 1.0) * 100.0,
        last_price,
        ema20,
        cap_class,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::TradeSide;
    use crate::market_intel::GlobalMarketStats;
    use crate::runtime_config::UniverseConfig;
    use crate::types::{MarketCapClass, Side};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ---- fixtures ----------------------------------------------------------

    /// Hourly candles with constant turnover and a chosen last turnover.
    fn candles(closes: &[f64], turnover: f64, last_turnover: f64) -> Vec<Candle> {
        let n = closes.len();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let t = if i + 1 == n { last_turnover } else { turnover };
                Candle::new(i as i64 * 3_600_000, c, c * 1.002, c * 0.998, c, t / c, t)
            })
            .collect()
    }

    fn rising() -> Vec<f64> {
        (0..200).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    fn falling() -> Vec<f64> {
        (0..200).map(|i| 300.0 - i as f64 * 0.5).collect()
    }

    #[derive(Default)]
    struct MockProvider {
        symbols: Vec<String>,
        series: HashMap<String, Vec<Candle>>,
        trades: HashMap<String, Vec<Trade>>,
        failing: HashSet<String>,
        hanging: HashSet<String>,
        funding: HashMap<String, f64>,
        list_calls: AtomicUsize,
    }

    impl MockProvider {
        fn with_series(mut self, symbol: &str, candles: Vec<Candle>, listed: bool) -> Self {
            if listed {
                self.symbols.push(symbol.to_string());
            }
            self.series.insert(symbol.to_string(), candles);
            self
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn exchange(&self) -> Exchange {
            Exchange::Binance
        }

        async fn list_liquid_symbols(&self, _quote: &str, limit: usize) -> Result<Vec<String>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.symbols.iter().take(limit).cloned().collect())
        }

        async fn get_candles(&self, symbol: &str, _tf: &str, limit: usize) -> Result<Vec<Candle>> {
            if self.hanging.contains(symbol) {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
            }
            if self.failing.contains(symbol) {
                return Err(anyhow!("HTTP 503"));
            }
            let series = self
                .series
                .get(symbol)
                .ok_or_else(|| anyhow!("unknown symbol {symbol}"))?;
            Ok(series[series.len().saturating_sub(limit)..].to_vec())
        }

        async fn get_trades(&self, symbol: &str, _limit: usize) -> Result<Vec<Trade>> {
            Ok(self.trades.get(symbol).cloned().unwrap_or_default())
        }

        async fn funding_rate(&self, symbol: &str) -> Option<f64> {
            self.funding.get(symbol).copied()
        }
    }

    struct FixedGlobal(GlobalMarketStats);

    #[async_trait]
    impl GlobalMarketSource for FixedGlobal {
        async fn global_market_stats(&self) -> GlobalMarketStats {
            self.0.clone()
        }
    }

    fn config() -> ScanConfig {
        let mut cfg = ScanConfig::default();
        cfg.universes = vec![UniverseConfig {
            exchange: Exchange::Binance,
            limit: 50,
        }];
        cfg.timeframes = vec!["1h".to_string()];
        cfg.candidates.enabled = false;
        cfg
    }

    fn orchestrator(cfg: ScanConfig, provider: MockProvider, total_change: f64) -> ScanOrchestrator {
        orchestrator_with(cfg, Arc::new(provider), total_change)
    }

    fn orchestrator_with(cfg: ScanConfig, provider: Arc<MockProvider>, total_change: f64) -> ScanOrchestrator {
        ScanOrchestrator::new(
            Arc::new(cfg),
            vec![provider as Arc<dyn MarketDataProvider>],
            Arc::new(FixedGlobal(GlobalMarketStats {
                total_market_change_pct: total_change,
                btc_dominance_pct: Some(52.0),
                usdt_dominance_pct: Some(5.5),
            })),
            Arc::new(MarketCapBook::default()),
        )
    }

    /// A: BUY, B: SELL, C: illiquid.  Reference asset per `btc_up`.
    fn three_symbol_provider(btc_up: bool) -> MockProvider {
        let btc = if btc_up { rising() } else { falling() };
        MockProvider::default()
            .with_series("AUSDT", candles(&rising(), 1_000_000.0, 2_000_000.0), true)
            .with_series("BUSDT", candles(&falling(), 1_000_000.0, 500_000.0), true)
            .with_series("CUSDT", candles(&rising(), 1_000_000.0, 50_000.0), true)
            .with_series("BTCUSDT", candles(&btc, 5e8, 5e8), false)
    }

    fn symbols(v: &[Signal]) -> Vec<&str> {
        v.iter().map(|s| s.symbol.as_str()).collect()
    }

    // ---- tests -------------------------------------------------------------

    #[tokio::test]
    async fn end_to_end_buy_sell_and_illiquid() {
        let report = orchestrator(config(), three_symbol_provider(true), 1.0)
            .run()
            .await
            .unwrap();

        assert_eq!(symbols(&report.signals.buys), vec!["AUSDT"]);
        assert_eq!(report.signals.buys[0].side, Side::Buy);
        assert_eq!(symbols(&report.signals.sells), vec!["BUSDT"]);
        assert_eq!(report.signals.skip_count(SkipReason::LowLiquidity), 1);
        assert_eq!(report.total_pairs, 3);
        assert_eq!(report.universe[0].symbols, 3);
        assert!(!report.regime.buy_suppressed);
        assert!(report.candidates.is_none());
    }

    #[tokio::test]
    async fn weak_reference_and_falling_market_suppress_buys() {
        let report = orchestrator(config(), three_symbol_provider(false), -0.8)
            .run()
            .await
            .unwrap();

        assert!(report.regime.buy_suppressed);
        assert!(report.signals.buys.is_empty());
        assert_eq!(report.signals.suppressed_buys, 1);
        assert_eq!(symbols(&report.signals.sells), vec!["BUSDT"]);
    }

    #[tokio::test]
    async fn empty_universe_is_fatal() {
        let provider = MockProvider::default().with_series("BTCUSDT", candles(&rising(), 1e8, 1e8), false);
        let result = orchestrator(config(), provider, 0.0).run().await;
        assert!(matches!(result, Err(ScanError::EmptyUniverse)));
    }

    #[tokio::test]
    async fn fetch_failures_are_skips_not_errors() {
        let mut provider = three_symbol_provider(true);
        provider.failing.insert("AUSDT".to_string());
        provider.symbols.push("GHOSTUSDT".to_string());

        let report = orchestrator(config(), provider, 1.0).run().await.unwrap();
        assert!(report.signals.buys.is_empty());
        assert_eq!(report.signals.skip_count(SkipReason::FetchFailed), 2);
        assert_eq!(symbols(&report.signals.sells), vec!["BUSDT"]);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_fetch_times_out() {
        let mut provider = three_symbol_provider(true);
        provider.hanging.insert("AUSDT".to_string());

        let report = orchestrator(config(), provider, 1.0).run().await.unwrap();
        assert_eq!(report.signals.skip_count(SkipReason::TimedOut), 1);
        assert_eq!(symbols(&report.signals.sells), vec!["BUSDT"]);
    }

    #[tokio::test]
    async fn every_timeframe_is_a_pair() {
        let mut cfg = config();
        cfg.timeframes = vec!["15m".into(), "1h".into(), "4h".into()];
        cfg.max_concurrency = 2;
        let report = orchestrator(cfg, three_symbol_provider(true), 1.0)
            .run()
            .await
            .unwrap();
        assert_eq!(report.total_pairs, 9);
        assert_eq!(report.signals.buys.len(), 3);
        assert_eq!(report.signals.skip_count(SkipReason::LowLiquidity), 3);
    }

    #[tokio::test]
    async fn funding_is_attached_when_configured() {
        let mut cfg = config();
        cfg.classifier.annotate_funding = true;
        let mut provider = three_symbol_provider(true);
        provider.funding.insert("BUSDT".to_string(), 0.0125);

        let report = orchestrator(cfg, provider, 1.0).run().await.unwrap();
        assert_eq!(report.signals.sells[0].funding_rate, Some(0.0125));
        assert_eq!(report.signals.buys[0].funding_rate, None);
    }

    #[tokio::test]
    async fn orderflow_pass_ranks_candidates() {
        let mut cfg = config();
        cfg.candidates.enabled = true;
        let mut provider = three_symbol_provider(true);
        provider.trades.insert(
            "AUSDT".to_string(),
            vec![
                Trade::new(200.0, 3_500.0, TradeSide::Buy, 1),
                Trade::new(200.0, 100.0, TradeSide::Sell, 2),
            ],
        );

        let report = orchestrator(cfg, provider, 1.0).run().await.unwrap();
        let set = report.candidates.unwrap();
        assert_eq!(set.longs.len(), 1);
        assert_eq!(set.longs[0].symbol, "AUSDT");
        assert_eq!(set.longs[0].cap_class, MarketCapClass::Unknown);
        assert!(set.shorts.is_empty());
    }

    #[tokio::test]
    async fn orderflow_pass_reuses_phase_one_listing() {
        let mut cfg = config();
        cfg.candidates.enabled = true;
        cfg.candidates.symbol_limit = 2;
        let provider = Arc::new(three_symbol_provider(true));

        let report = orchestrator_with(cfg, Arc::clone(&provider), 1.0).run().await.unwrap();
        assert!(report.candidates.is_some());
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn orderflow_pass_lists_again_when_phase_one_was_shallower() {
        let mut cfg = config();
        cfg.candidates.enabled = true;
        cfg.universes[0].limit = 2;
        cfg.candidates.symbol_limit = 3;
        let provider = Arc::new(three_symbol_provider(true));

        let report = orchestrator_with(cfg, Arc::clone(&provider), 1.0).run().await.unwrap();
        assert_eq!(report.total_pairs, 2);
        assert!(report.candidates.is_some());
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn short_history_is_insufficient_data() {
        let provider = three_symbol_provider(true).with_series(
            "DUSDT",
            candles(&rising()[..30], 1_000_000.0, 2_000_000.0),
            true,
        );

        let report = orchestrator(config(), provider, 1.0).run().await.unwrap();
        assert_eq!(report.total_pairs, 4);
        assert_eq!(report.signals.skip_count(SkipReason::InsufficientData), 1);
        assert_eq!(symbols(&report.signals.buys), vec!["AUSDT"]);
    }

    #[tokio::test]
    async fn buys_ranked_by_confidence_and_truncated() {
        let mut cfg = config();
        cfg.max_lines_per_side = 2;
        let provider = MockProvider::default()
            .with_series("LOWUSDT", candles(&rising(), 1_000_000.0, 1_200_000.0), true)
            .with_series("HIGHUSDT", candles(&rising(), 1_000_000.0, 1_700_000.0), true)
            .with_series("MIDUSDT", candles(&rising(), 1_000_000.0, 1_450_000.0), true)
            .with_series("BTCUSDT", candles(&rising(), 5e8, 5e8), false);

        let report = orchestrator(cfg, provider, 1.0).run().await.unwrap();
        let buys = &report.signals.buys;
        assert_eq!(symbols(buys), vec!["HIGHUSDT", "MIDUSDT"]);
        assert!(buys[0].confidence > buys[1].confidence);
        assert_eq!(report.signals.eligible_signals, 3);
        assert!(report.signals.average_confidence < buys[0].confidence);
        assert!(report.signals.sells.is_empty());
    }

    #[test]
    fn symbol_stats_needs_a_day_of_history() {
        let analyzer = OrderflowAnalyzer::default();
        let book = MarketCapBook::default();
        let short = candles(&rising()[..40], 1.0, 1.0);
        assert!(symbol_stats(Exchange::Binance, "X", &[], &short, &analyzer, &book, 0.2).is_none());

        let full = candles(&rising(), 1.0, 1.0);
        let stats = symbol_stats(Exchange::Binance, "X", &[], &full, &analyzer, &book, 0.2).unwrap();
        assert_eq!(stats.trend_tag, TrendTag::Up);
        let expected = (199.5 / 187.5 - 1.0) * 100.0;
        assert!((stats.pct_change_24h - expected).abs() < 1e-9);
    }
}
