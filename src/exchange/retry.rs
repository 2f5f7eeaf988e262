// =============================================================================
// HTTP Client Factory — retrying reqwest client for public REST calls
// =============================================================================
//
// Every outbound GET runs through a `reqwest-middleware` stack:
//
//   RetryTransientMiddleware   exponential backoff between `min_backoff` and
//                              `max_backoff`; transport failures, 408, 429 and
//                              5xx are retried up to `max_retries` times
//   WeightMiddleware           (exchange clients only) waits out any open
//                              weight cooldown, then records the response
//                              headers; runs once per attempt
//
// Non-transient statuses come back as ordinary responses; callers decide.
// =============================================================================

use anyhow::{Context, Result};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::rate_limit::{WeightMiddleware, WeightTracker};

/// Backoff knobs of the retry middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_backoff_ms: 350,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> ExponentialBackoff {
        let min = Duration::from_millis(self.min_backoff_ms);
        let max = Duration::from_millis(self.max_backoff_ms.max(self.min_backoff_ms));
        ExponentialBackoff::builder()
            .retry_bounds(min, max)
            .build_with_max_retries(self.max_retries)
    }
}

/// Build the middleware client.  `weights` adds the request-weight layer
/// beneath the retry layer so that every attempt is gated and recorded.
pub fn build_http_client(
    timeout: Duration,
    policy: &RetryPolicy,
    weights: Option<Arc<WeightTracker>>,
) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build reqwest client")?;

    let mut builder =
        ClientBuilder::new(client).with(RetryTransientMiddleware::new_with_policy(policy.backoff()));
    if let Some(weights) = weights {
        builder = builder.with(WeightMiddleware::new(weights));
    }
    Ok(builder.build())
}
