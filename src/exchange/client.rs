// =============================================================================
// Spot REST Client — public market data for Binance and MEXC
// =============================================================================
//
// Both venues expose the same v3 spot surface for what the scanner needs:
//
//   GET /api/v3/ticker/24hr   universe, ranked by quoteVolume
//   GET /api/v3/klines        array-of-arrays candles
//   GET /api/v3/trades        recent trades with `isBuyerMaker`
//
// Differences handled here: MEXC names the hourly interval `60m`, MEXC klines
// carry 8 columns instead of 12, and funding rates come from each venue's own
// perpetual-futures host.  Only public endpoints are called; nothing is signed.
//
// Every request goes through the retry middleware and, beneath it, the
// weight middleware (cooldown), so each attempt is gated.
// =============================================================================

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::rate_limit::{WeightLimits, WeightTracker};
use super::retry::{build_http_client, RetryPolicy};
use crate::market_data::{Candle, MarketDataProvider, Trade, TradeSide};
use crate::types::Exchange;

const BINANCE_SPOT_URL: &str = "https://api.binance.com";
const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";
const MEXC_SPOT_URL: &str = "https://api.mexc.com";
const MEXC_FUTURES_URL: &str = "https://contract.mexc.com";

/// Kline array indices shared by both venues.
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, [7] quoteAssetVolume, ...
const KLINE_MIN_COLUMNS: usize = 8;

/// Intervals MEXC spot serves (by their scanner names).
const MEXC_TIMEFRAMES: [&str; 8] = ["1m", "5m", "15m", "30m", "1h", "4h", "1d", "1w"];
/// Intervals Binance spot serves.
const BINANCE_TIMEFRAMES: [&str; 13] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "1w",
];

/// Exchange-side cap on `/api/v3/trades` `limit`.
const MAX_TRADES_LIMIT: usize = 1000;

#[derive(Clone)]
pub struct SpotRestClient {
    exchange: Exchange,
    base_url: String,
    futures_base_url: String,
    client: ClientWithMiddleware,
    weights: Arc<WeightTracker>,
}

impl SpotRestClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(
        exchange: Exchange,
        timeout: Duration,
        retry: RetryPolicy,
        limits: WeightLimits,
    ) -> Result<Self> {
        let weights = Arc::new(WeightTracker::new(limits));
        let client = build_http_client(timeout, &retry, Some(Arc::clone(&weights)))?;

        let (base_url, futures_base_url) = match exchange {
            Exchange::Binance => (BINANCE_SPOT_URL, BINANCE_FUTURES_URL),
            Exchange::Mexc => (MEXC_SPOT_URL, MEXC_FUTURES_URL),
        };

        debug!(%exchange, base_url, "spot client initialised");

        Ok(Self {
            exchange,
            base_url: base_url.to_string(),
            futures_base_url: futures_base_url.to_string(),
            client,
            weights,
        })
    }

    #[cfg(test)]
    pub fn with_base_urls(mut self, spot: impl Into<String>, futures: impl Into<String>) -> Self {
        self.base_url = spot.into();
        self.futures_base_url = futures.into();
        self
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    async fn get_json(&self, base: &str, path_and_query: &str) -> Result<serde_json::Value> {
        let url = format!("{base}{path_and_query}");

        let resp = self
            .client
            .get(url.as_str())
            .send()
            .await
            .with_context(|| format!("{} GET {}", self.exchange, path_and_query))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "{} GET {} returned HTTP {}: {}",
                self.exchange,
                path_and_query,
                status.as_u16(),
                body
            );
        }
        resp.json::<serde_json::Value>()
            .await
            .with_context(|| format!("{} GET {}: invalid JSON body", self.exchange, path_and_query))
    }

    /// Whether `exchange` serves klines on `timeframe`.
    pub fn supports_timeframe(exchange: Exchange, timeframe: &str) -> bool {
        let tf = timeframe.to_ascii_lowercase();
        match exchange {
            Exchange::Binance => BINANCE_TIMEFRAMES.contains(&tf.as_str()),
            Exchange::Mexc => MEXC_TIMEFRAMES.contains(&tf.as_str()),
        }
    }

    /// Venue-specific interval name.
    pub fn interval_param(&self, timeframe: &str) -> String {
        let tf = timeframe.to_ascii_lowercase();
        match (self.exchange, tf.as_str()) {
            (Exchange::Mexc, "1h") => "60m".to_string(),
            (Exchange::Mexc, "1w") => "1W".to_string(),
            _ => tf,
        }
    }

    // -------------------------------------------------------------------------
    // Parsing
    // -------------------------------------------------------------------------

    /// Symbols ending in `quote`, ranked by descending quote volume.
    pub fn parse_tickers(body: &serde_json::Value, quote: &str, limit: usize) -> Result<Vec<String>> {
        let rows = body.as_array().context("ticker response is not an array")?;

        let mut ranked: Vec<(String, f64)> = rows
            .iter()
            .filter_map(|row| {
                let symbol = row["symbol"].as_str()?;
                if symbol.len() <= quote.len() || !symbol.ends_with(quote) {
                    return None;
                }
                let qv = parse_str_f64(&row["quoteVolume"]).unwrap_or(0.0);
                Some((symbol.to_string(), qv))
            })
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked.into_iter().take(limit).map(|(s, _)| s).collect())
    }

    pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
        let raw = body.as_array().context("klines response is not an array")?;

        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw {
            let arr = entry.as_array().context("kline entry is not an array")?;
            if arr.len() < KLINE_MIN_COLUMNS {
                warn!("skipping malformed kline entry with {} elements", arr.len());
                continue;
            }

            let open_time = arr[0].as_i64().unwrap_or(0);
            let open = parse_str_f64(&arr[1])?;
            let high = parse_str_f64(&arr[2])?;
            let low = parse_str_f64(&arr[3])?;
            let close = parse_str_f64(&arr[4])?;
            let volume = parse_str_f64(&arr[5])?;
            let quote_turnover = parse_str_f64(&arr[7])?;

            candles.push(Candle::new(open_time, open, high, low, close, volume, quote_turnover));
        }
        Ok(candles)
    }

    pub fn parse_trades(body: &serde_json::Value) -> Result<Vec<Trade>> {
        let raw = body.as_array().context("trades response is not an array")?;

        let mut trades = Vec::with_capacity(raw.len());
        for entry in raw {
            let price = parse_str_f64(&entry["price"])?;
            let size = parse_str_f64(&entry["qty"])?;
            let side = TradeSide::from_buyer_maker(entry["isBuyerMaker"].as_bool().unwrap_or(false));
            let timestamp = entry["time"].as_i64().unwrap_or(0);
            trades.push(Trade::new(price, size, side, timestamp));
        }
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }

    /// `priceChangePercent` of a single-symbol 24h ticker.
    pub fn parse_price_change(body: &serde_json::Value) -> Option<f64> {
        parse_str_f64(&body["priceChangePercent"]).ok().filter(|v| v.is_finite())
    }

    /// Funding rate from the venue's perpetual-futures payload.
    pub fn parse_funding(exchange: Exchange, body: &serde_json::Value) -> Option<f64> {
        let raw = match exchange {
            Exchange::Binance => &body["lastFundingRate"],
            Exchange::Mexc => &body["data"]["fundingRate"],
        };
        parse_str_f64(raw).ok().filter(|v| v.is_finite())
    }

    fn funding_path(&self, symbol: &str) -> String {
        match self.exchange {
            Exchange::Binance => format!("/fapi/v1/premiumIndex?symbol={symbol}"),
            Exchange::Mexc => {
                let contract = match symbol.strip_suffix("USDT") {
                    Some(base) => format!("{base}_USDT"),
                    None => symbol.to_string(),
                };
                format!("/api/v1/contract/funding_rate/{contract}")
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for SpotRestClient {
    fn exchange(&self) -> Exchange {
        self.exchange
    }

    #[instrument(skip(self), name = "spot::list_liquid_symbols", fields(exchange = %self.exchange))]
    async fn list_liquid_symbols(&self, quote_asset: &str, limit: usize) -> Result<Vec<String>> {
        let body = self.get_json(&self.base_url, "/api/v3/ticker/24hr").await?;
        let symbols = Self::parse_tickers(&body, quote_asset, limit)?;
        debug!(count = symbols.len(), "universe listed");
        Ok(symbols)
    }

    #[instrument(skip(self), name = "spot::get_candles", fields(exchange = %self.exchange))]
    async fn get_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let path = format!(
            "/api/v3/klines?symbol={}&interval={}&limit={}",
            symbol,
            self.interval_param(timeframe),
            limit
        );
        let body = self.get_json(&self.base_url, &path).await?;
        let candles = Self::parse_klines(&body)?;
        debug!(symbol, timeframe, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    #[instrument(skip(self), name = "spot::get_trades", fields(exchange = %self.exchange))]
    async fn get_trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>> {
        let path = format!(
            "/api/v3/trades?symbol={}&limit={}",
            symbol,
            limit.min(MAX_TRADES_LIMIT)
        );
        let body = self.get_json(&self.base_url, &path).await?;
        let trades = Self::parse_trades(&body)?;
        debug!(symbol, count = trades.len(), "trades fetched");
        Ok(trades)
    }

    async fn price_change_24h(&self, symbol: &str) -> Option<f64> {
        let path = format!("/api/v3/ticker/24hr?symbol={symbol}");
        match self.get_json(&self.base_url, &path).await {
            Ok(body) => Self::parse_price_change(&body),
            Err(e) => {
                debug!(symbol, error = %e, "no 24h ticker");
                None
            }
        }
    }

    async fn funding_rate(&self, symbol: &str) -> Option<f64> {
        let path = self.funding_path(symbol);
        match self.get_json(&self.futures_base_url, &path).await {
            Ok(body) => Self::parse_funding(self.exchange, &body),
            Err(e) => {
                debug!(symbol, error = %e, "no funding rate");
                None
            }
        }
    }
}

impl std::fmt::Debug for SpotRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotRestClient")
            .field("exchange", &self.exchange)
            .field("base_url", &self.base_url)
            .field("futures_base_url", &self.futures_base_url)
            .field("weights", &self.weights)
            .finish()
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::testing::{canned_server, http_response};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn client(exchange: Exchange) -> SpotRestClient {
        SpotRestClient::new(
            exchange,
            Duration::from_secs(1),
            RetryPolicy::default(),
            WeightLimits::default(),
        )
        .unwrap()
    }

    #[test]
    fn tickers_filter_quote_and_rank_by_turnover() {
        let body = json!([
            { "symbol": "ETHUSDT", "quoteVolume": "900000000.5" },
            { "symbol": "BTCUSDT", "quoteVolume": "1500000000" },
            { "symbol": "ETHBTC",  "quoteVolume": "99999999999" },
            { "symbol": "USDT",    "quoteVolume": "1" },
            { "symbol": "DOGEUSDT", "quoteVolume": 120000000.0 },
            { "symbol": "XUSDT" }
        ]);
        let symbols = SpotRestClient::parse_tickers(&body, "USDT", 3).unwrap();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "DOGEUSDT"]);
    }

    #[test]
    fn binance_klines_take_quote_volume_column() {
        let body = json!([
            [1700000000000_i64, "1.0", "2.0", "0.5", "1.5", "100", 1700000059999_i64,
             "150.0", 42, "50", "75", "0"]
        ]);
        let candles = SpotRestClient::parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].open_time, 1700000000000);
        assert!((candles[0].close - 1.5).abs() < 1e-12);
        assert!((candles[0].quote_turnover - 150.0).abs() < 1e-12);
    }

    #[test]
    fn mexc_eight_column_klines_parse() {
        let body = json!([
            [1700000000000_i64, "10", "11", "9", "10.5", "3", 1700003599999_i64, "31.5"],
            [1700003600000_i64, "10.5", "12", "10", "11", "4"]
        ]);
        let candles = SpotRestClient::parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 1);
        assert!((candles[0].quote_turnover - 31.5).abs() < 1e-12);
    }

    #[test]
    fn klines_reject_non_array() {
        assert!(SpotRestClient::parse_klines(&json!({ "code": -1121 })).is_err());
    }

    #[test]
    fn trades_map_buyer_maker_to_taker_side() {
        let body = json!([
            { "price": "100", "qty": "2", "time": 2, "isBuyerMaker": false },
            { "price": "101", "qty": "1", "time": 1, "isBuyerMaker": true }
        ]);
        let trades = SpotRestClient::parse_trades(&body).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].timestamp, 1);
        assert_eq!(trades[0].side, TradeSide::Sell);
        assert_eq!(trades[1].side, TradeSide::Buy);
        assert!((trades[1].notional() - 200.0).abs() < 1e-12);
    }

    #[test]
    fn funding_payloads() {
        let binance = json!({ "symbol": "BTCUSDT", "lastFundingRate": "0.00010000" });
        let mexc = json!({ "success": true, "data": { "symbol": "BTC_USDT", "fundingRate": -0.0002 } });
        assert_eq!(SpotRestClient::parse_funding(Exchange::Binance, &binance), Some(0.0001));
        assert_eq!(SpotRestClient::parse_funding(Exchange::Mexc, &mexc), Some(-0.0002));
        assert_eq!(SpotRestClient::parse_funding(Exchange::Binance, &json!({})), None);
    }

    #[test]
    fn venue_specific_paths() {
        let mexc = client(Exchange::Mexc);
        let binance = client(Exchange::Binance);
        assert_eq!(mexc.interval_param("1h"), "60m");
        assert_eq!(mexc.interval_param("4h"), "4h");
        assert_eq!(binance.interval_param("1H"), "1h");
        assert_eq!(
            mexc.funding_path("SOLUSDT"),
            "/api/v1/contract/funding_rate/SOL_USDT"
        );
        assert_eq!(
            binance.funding_path("SOLUSDT"),
            "/fapi/v1/premiumIndex?symbol=SOLUSDT"
        );
    }

    #[test]
    fn mexc_serves_fewer_intervals() {
        assert!(SpotRestClient::supports_timeframe(Exchange::Mexc, "1H"));
        assert!(SpotRestClient::supports_timeframe(Exchange::Mexc, "4h"));
        assert!(!SpotRestClient::supports_timeframe(Exchange::Mexc, "2h"));
        assert!(!SpotRestClient::supports_timeframe(Exchange::Mexc, "12h"));
        assert!(SpotRestClient::supports_timeframe(Exchange::Binance, "12h"));
        assert!(!SpotRestClient::supports_timeframe(Exchange::Binance, "7m"));
    }

    #[test]
    fn price_change_payload() {
        let body = json!({ "symbol": "BTCUSDT", "priceChangePercent": "-1.250" });
        assert_eq!(SpotRestClient::parse_price_change(&body), Some(-1.25));
        assert_eq!(SpotRestClient::parse_price_change(&json!({})), None);
    }

    #[tokio::test]
    async fn requests_retry_and_fail_soft() {
        let (base, hits) = canned_server(vec![
            http_response(503, &[], ""),
            http_response(200, &[], r#"{"symbol":"BTCUSDT","priceChangePercent":"2.5"}"#),
            http_response(400, &[], r#"{"code":-1121,"msg":"Invalid symbol."}"#),
        ])
        .await;

        let retry = RetryPolicy {
            max_retries: 2,
            min_backoff_ms: 1,
            max_backoff_ms: 5,
        };
        let c = SpotRestClient::new(Exchange::Binance, Duration::from_secs(2), retry, WeightLimits::default())
            .unwrap()
            .with_base_urls(base.clone(), base);

        assert_eq!(c.price_change_24h("BTCUSDT").await, Some(2.5));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let err = c.get_candles("NOPE", "1h", 10).await.unwrap_err();
        assert!(format!("{err:#}").contains("HTTP 400"));
    }

    #[test]
    fn debug_output_names_exchange() {
        let dbg = format!("{:?}", client(Exchange::Binance));
        assert!(dbg.contains("Binance"));
        assert!(dbg.contains("api.binance.com"));
    }
}
