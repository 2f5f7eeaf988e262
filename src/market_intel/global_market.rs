// =============================================================================
// Global Market Stats — CoinGecko aggregates
// =============================================================================
//
// Two public CoinGecko endpoints are used:
//
//   GET /api/v3/global         total market-cap 24h change, dominance by coin
//   GET /api/v3/coins/markets  paginated market caps (see `market_cap.rs`)
//
// Global stats are advisory inputs to the regime guard; any failure degrades
// to neutral defaults (0.0 change, unknown dominance) instead of an error.
// =============================================================================

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::exchange::retry::{build_http_client, RetryPolicy};
use crate::market_intel::market_cap::MarketCapBook;

const COINGECKO_BASE_URL: &str = "https://api.coingecko.com";

/// Market-wide 24h aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalMarketStats {
    /// Total crypto market-cap change over 24h, in percent.
    pub total_market_change_pct: f64,
    pub btc_dominance_pct: Option<f64>,
    pub usdt_dominance_pct: Option<f64>,
}

impl GlobalMarketStats {
    /// Parse the body of `/api/v3/global`.
    pub fn from_json(body: &serde_json::Value) -> Option<Self> {
        let data = body.get("data")?;
        let total = data["market_cap_change_percentage_24h_usd"].as_f64()?;
        let dominance = &data["market_cap_percentage"];
        Some(Self {
            total_market_change_pct: total,
            btc_dominance_pct: dominance["btc"].as_f64(),
            usdt_dominance_pct: dominance["usdt"].as_f64(),
        })
    }
}

/// Source of market-wide aggregates.
#[async_trait]
pub trait GlobalMarketSource: Send + Sync {
    /// Never fails; unavailable data yields `GlobalMarketStats::default()`.
    async fn global_market_stats(&self) -> GlobalMarketStats;
}

/// Public CoinGecko REST client.
#[derive(Clone)]
pub struct CoinGeckoClient {
    base_url: String,
    client: ClientWithMiddleware,
    /// Pages of 250 coins fetched for the market-cap snapshot.
    market_pages: u32,
}

impl CoinGeckoClient {
    pub fn new(timeout: Duration, retry: RetryPolicy, market_pages: u32) -> Result<Self> {
        let client = build_http_client(timeout, &retry, None)
            .context("failed to build HTTP client for CoinGecko")?;

        Ok(Self {
            base_url: COINGECKO_BASE_URL.to_string(),
            client,
            market_pages,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json(&self, path_and_query: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self
            .client
            .get(url.as_str())
            .send()
            .await
            .with_context(|| format!("CoinGecko GET {path_and_query}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("CoinGecko GET {path_and_query} returned HTTP {}: {body}", status.as_u16());
        }
        resp.json::<serde_json::Value>()
            .await
            .with_context(|| format!("CoinGecko GET {path_and_query}: invalid JSON body"))
    }

    /// GET /api/v3/global.
    #[instrument(skip(self), name = "coingecko::fetch_global")]
    pub async fn fetch_global(&self) -> Result<GlobalMarketStats> {
        let body = self.get_json("/api/v3/global").await?;
        GlobalMarketStats::from_json(&body).context("global response missing market data")
    }

    /// Build a market-cap snapshot from paginated `/coins/markets`.
    ///
    /// A failed page ends pagination; whatever was collected so far is kept.
    #[instrument(skip(self, book), name = "coingecko::fetch_market_caps")]
    pub async fn fetch_market_caps(&self, mut book: MarketCapBook) -> MarketCapBook {
        for page in 1..=self.market_pages {
            let path = format!(
                "/api/v3/coins/markets?vs_currency=usd&order=market_cap_desc&per_page=250&page={page}"
            );
            match self.get_json(&path).await {
                Ok(body) => {
                    let added = book.extend_from_json(&body);
                    debug!(page, added, "market-cap page loaded");
                    if added == 0 {
                        break;
                    }
                }
                Err(e) => {
                    warn!(page, error = %e, "market-cap page failed, keeping partial snapshot");
                    break;
                }
            }
        }
        book
    }
}

#[async_trait]
impl GlobalMarketSource for CoinGeckoClient {
    async fn global_market_stats(&self) -> GlobalMarketStats {
        match self.fetch_global().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "global market stats unavailable, using neutral defaults");
                GlobalMarketStats::default()
            }
        }
    }
}

impl std::fmt::Debug for CoinGeckoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinGeckoClient")
            .field("base_url", &self.base_url)
            .field("market_pages", &self.market_pages)
            .finish()
    }
}
