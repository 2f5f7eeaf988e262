// =============================================================================
// Scan Configuration — one immutable value per run
// =============================================================================
//
// Every tunable of a scan lives here: universe, timeframes, concurrency,
// classifier thresholds, regime guard, order-flow tiers, candidate buckets,
// transport policy and report options.
//
// Resolution order:
//   1. `scanner_config.json` (all fields `#[serde(default)]`, so an older or
//      partial file still loads) or built-in defaults when absent.
//   2. Environment overrides, applied by the entry point through a lookup
//      function; components never read the environment themselves.
//   3. `validate()`; the value is then frozen and shared by reference.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::candidates::CandidateConfig;
use crate::error::ScanError;
use crate::exchange::{RetryPolicy, SpotRestClient, WeightLimits};
use crate::market_intel::MarketCapBounds;
use crate::orderflow::OrderflowConfig;
use crate::regime::RegimeConfig;
use crate::report::ReportConfig;
use crate::signals::{ClassifierConfig, ClassifierPreset, SellVolumeRule};
use crate::types::Exchange;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_universes() -> Vec<UniverseConfig> {
    vec![
        UniverseConfig {
            exchange: Exchange::Mexc,
            limit: 200,
        },
        UniverseConfig {
            exchange: Exchange::Binance,
            limit: 200,
        },
    ]
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_timeframes() -> Vec<String> {
    ["15m", "1h", "4h", "1d"].iter().map(|s| s.to_string()).collect()
}

fn default_candle_limit() -> usize {
    200
}

fn default_max_concurrency() -> usize {
    12
}

fn default_task_timeout_secs() -> u64 {
    30
}

fn default_max_lines_per_side() -> usize {
    15
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_market_cap_pages() -> u32 {
    4
}

// =============================================================================
// Config types
// =============================================================================

/// One exchange's share of the symbol universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    pub exchange: Exchange,
    /// Most liquid symbols taken from the exchange.
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_universes")]
    pub universes: Vec<UniverseConfig>,

    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<String>,

    /// Candles fetched per (symbol, timeframe).
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,

    /// Classification tasks in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    #[serde(default = "default_max_lines_per_side")]
    pub max_lines_per_side: usize,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub regime: RegimeConfig,

    #[serde(default)]
    pub orderflow: OrderflowConfig,

    #[serde(default)]
    pub candidates: CandidateConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub weight_limits: WeightLimits,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub market_cap_bounds: MarketCapBounds,

    /// CoinGecko `/coins/markets` pages (250 coins each).
    #[serde(default = "default_market_cap_pages")]
    pub market_cap_pages: u32,

    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            universes: default_universes(),
            quote_asset: default_quote_asset(),
            timeframes: default_timeframes(),
            candle_limit: default_candle_limit(),
            max_concurrency: default_max_concurrency(),
            task_timeout_secs: default_task_timeout_secs(),
            max_lines_per_side: default_max_lines_per_side(),
            classifier: ClassifierConfig::default(),
            regime: RegimeConfig::default(),
            orderflow: OrderflowConfig::default(),
            candidates: CandidateConfig::default(),
            retry: RetryPolicy::default(),
            weight_limits: WeightLimits::default(),
            http_timeout_secs: default_http_timeout_secs(),
            market_cap_bounds: MarketCapBounds::default(),
            market_cap_pages: default_market_cap_pages(),
            report: ReportConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scan config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scan config from {}", path.display()))?;

        info!(
            path = %path.display(),
            timeframes = ?config.timeframes,
            "scan config loaded"
        );

        Ok(config)
    }

    /// Apply environment-style overrides.  `lookup` returns the raw value of a
    /// variable, if set.  `PRESET` is applied first so that the finer
    /// overrides land on top of it.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ScanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PRESET") {
            let preset: ClassifierPreset = raw.parse().map_err(ScanError::InvalidConfig)?;
            self.classifier = ClassifierConfig::preset(preset);
        }

        if let Some(raw) = lookup("TIMEFRAMES") {
            self.timeframes = raw
                .split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        for universe in &mut self.universes {
            let key = match universe.exchange {
                Exchange::Binance => "SCAN_LIMIT_BINANCE",
                Exchange::Mexc => "SCAN_LIMIT_MEXC",
            };
            if let Some(raw) = lookup(key) {
                universe.limit = parse_var(key, &raw)?;
            }
        }

        if let Some(raw) = lookup("MIN_TURNOVER") {
            self.classifier.min_turnover = parse_var("MIN_TURNOVER", &raw)?;
        }
        if let Some(raw) = lookup("VOL_RATIO_BUY") {
            self.classifier.buy_volume_ratio = parse_var("VOL_RATIO_BUY", &raw)?;
        }
        if let Some(raw) = lookup("VOL_RATIO_SELL") {
            let ratio: f64 = parse_var("VOL_RATIO_SELL", &raw)?;
            self.classifier.sell_volume = match self.classifier.sell_volume {
                SellVolumeRule::Drying { .. } => SellVolumeRule::Drying { max_ratio: ratio },
                SellVolumeRule::Surge { .. } => SellVolumeRule::Surge { min_ratio: ratio },
            };
        }
        if let Some(raw) = lookup("RSI_BUY_MIN") {
            self.classifier.buy_rsi_floor = parse_var("RSI_BUY_MIN", &raw)?;
        }
        if let Some(raw) = lookup("RSI_SELL_MAX") {
            self.classifier.sell_rsi_ceiling = parse_var("RSI_SELL_MAX", &raw)?;
        }
        if let Some(raw) = lookup("MARKET_GUARD") {
            self.regime.guard_enabled = raw.trim().eq_ignore_ascii_case("true");
        }
        if let Some(raw) = lookup("MAX_LINES_PER_SIDE") {
            self.max_lines_per_side = parse_var("MAX_LINES_PER_SIDE", &raw)?;
        }
        if let Some(raw) = lookup("MAX_CONCURRENCY") {
            self.max_concurrency = parse_var("MAX_CONCURRENCY", &raw)?;
        }

        Ok(())
    }

    /// Reject configurations a scan cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        let invalid = |msg: String| -> Result<(), ScanError> { Err(ScanError::InvalidConfig(msg)) };

        if self.universes.is_empty() || self.universes.iter().all(|u| u.limit == 0) {
            return invalid("at least one exchange universe with limit > 0 is required".into());
        }
        if self.quote_asset.trim().is_empty() {
            return invalid("quote_asset must not be empty".into());
        }
        if self.timeframes.is_empty() {
            return invalid("at least one timeframe is required".into());
        }
        for u in self.universes.iter().filter(|u| u.limit > 0) {
            if let Some(tf) = self
                .timeframes
                .iter()
                .find(|tf| !SpotRestClient::supports_timeframe(u.exchange, tf))
            {
                return invalid(format!("timeframe '{tf}' is not served by {}", u.exchange));
            }
        }
        let r = &self.regime;
        if let Some(tf) = r
            .timeframes
            .iter()
            .chain(&r.guard_timeframes)
            .chain(std::iter::once(&r.companion_timeframe))
            .find(|tf| !SpotRestClient::supports_timeframe(r.reference_exchange, tf))
        {
            return invalid(format!(
                "regime timeframe '{tf}' is not served by {}",
                r.reference_exchange
            ));
        }
        if self.max_concurrency == 0 {
            return invalid("max_concurrency must be at least 1".into());
        }
        if self.task_timeout_secs == 0 || self.http_timeout_secs == 0 {
            return invalid("timeouts must be at least 1 second".into());
        }
        if self.max_lines_per_side == 0 {
            return invalid("max_lines_per_side must be at least 1".into());
        }
        if self.candle_limit < self.classifier.min_candles {
            return invalid(format!(
                "candle_limit {} is below the classifier's min_candles {}",
                self.candle_limit, self.classifier.min_candles
            ));
        }

        let c = &self.classifier;
        if !(0.0..=100.0).contains(&c.buy_rsi_floor) || !(0.0..=100.0).contains(&c.sell_rsi_ceiling) {
            return invalid("RSI thresholds must lie in [0, 100]".into());
        }
        if c.min_turnover < 0.0 || c.buy_volume_ratio <= 0.0 {
            return invalid("min_turnover must be >= 0 and buy_volume_ratio > 0".into());
        }
        if let Some(gap) = c.max_gap_pct {
            if gap <= 0.0 {
                return invalid("max_gap_pct must be positive when set".into());
            }
        }
        let p = &c.indicators;
        if p.ema_fast == 0 || p.ema_fast >= p.ema_slow || p.macd_fast >= p.macd_slow {
            return invalid("fast periods must be positive and shorter than slow periods".into());
        }

        if self.regime.risk_on_dominance_pct > self.regime.risk_off_dominance_pct {
            return invalid("risk_on_dominance_pct must not exceed risk_off_dominance_pct".into());
        }

        self.orderflow.validate().map_err(ScanError::InvalidConfig)?;

        if self.candidates.max_per_bucket == 0 {
            return invalid("candidates.max_per_bucket must be at least 1".into());
        }
        if self.candidates.flat_band_pct < 0.0 {
            return invalid("candidates.flat_band_pct must be >= 0".into());
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ScanError> {
    raw.trim()
        .parse()
        .map_err(|_| ScanError::InvalidConfig(format!("{key}='{raw}' is not a valid value")))
}
