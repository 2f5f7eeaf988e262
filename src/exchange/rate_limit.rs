// =============================================================================
// Request-Weight Tracker — keeps a scan under the exchange weight budget
// =============================================================================
//
// Binance reports the request weight consumed in the current minute through
// the `X-MBX-USED-WEIGHT-1M` response header (MEXC omits it).  A full scan
// fires hundreds of kline requests in a burst, so the tracker:
//
//   - records the latest reported weight in an atomic counter,
//   - opens a cooldown window once the weight crosses the soft limit, or when
//     a 429/418 response carries `Retry-After`,
//   - makes every request wait out an open cooldown before it is sent.
//
// `WeightMiddleware` plugs the tracker into the reqwest-middleware stack so
// each retry attempt is gated and recorded like a first attempt.
// =============================================================================

use async_trait::async_trait;
use http::Extensions;
use parking_lot::Mutex;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightLimits {
    /// Weight at which requests start waiting for the next minute.
    pub soft_limit: u32,
    /// Cooldown applied when the soft limit is crossed.
    pub cooldown_ms: u64,
}

impl Default for WeightLimits {
    fn default() -> Self {
        Self {
            soft_limit: 4_800,
            cooldown_ms: 10_000,
        }
    }
}

pub struct WeightTracker {
    limits: WeightLimits,
    used_weight_1m: AtomicU32,
    cooldown_until: Mutex<Option<Instant>>,
}

impl WeightTracker {
    pub fn new(limits: WeightLimits) -> Self {
        Self {
            limits,
            used_weight_1m: AtomicU32::new(0),
            cooldown_until: Mutex::new(None),
        }
    }

    pub fn used_weight(&self) -> u32 {
        self.used_weight_1m.load(Ordering::Relaxed)
    }

    /// Record the weight header of a response.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(w) = headers
            .get(USED_WEIGHT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };
        self.record_weight(w);
    }

    pub fn record_weight(&self, weight: u32) {
        let prev = self.used_weight_1m.swap(weight, Ordering::Relaxed);
        debug!(used_weight_1m = weight, "request weight updated");

        if weight >= self.limits.soft_limit {
            if prev < self.limits.soft_limit {
                warn!(
                    used_weight = weight,
                    soft_limit = self.limits.soft_limit,
                    "request weight crossed soft limit, cooling down"
                );
            }
            self.extend_cooldown(Duration::from_millis(self.limits.cooldown_ms));
        }
    }

    /// Honour a `Retry-After` (seconds) from a rate-limited response.
    pub fn note_rate_limited(&self, headers: &reqwest::header::HeaderMap) {
        let secs = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(self.limits.cooldown_ms / 1_000);
        warn!(retry_after_secs = secs, "rate limited by exchange");
        self.extend_cooldown(Duration::from_secs(secs));
    }

    /// Remaining cooldown, if any.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let guard = self.cooldown_until.lock();
        let until = (*guard)?;
        until.checked_duration_since(Instant::now())
    }

    /// Sleep until any open cooldown window has passed.
    pub async fn wait_ready(&self) {
        if let Some(delay) = self.remaining_cooldown() {
            debug!(delay_ms = delay.as_millis() as u64, "waiting for weight cooldown");
            tokio::time::sleep(delay).await;
        }
    }

    fn extend_cooldown(&self, by: Duration) {
        let target = Instant::now() + by;
        let mut guard = self.cooldown_until.lock();
        match *guard {
            Some(existing) if existing >= target => {}
            _ => *guard = Some(target),
        }
    }
}

// =============================================================================
// Middleware
// =============================================================================

pub struct WeightMiddleware {
    tracker: Arc<WeightTracker>,
}

impl WeightMiddleware {
    pub fn new(tracker: Arc<WeightTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Middleware for WeightMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.tracker.wait_ready().await;

        let resp = next.run(req, extensions).await?;
        self.tracker.update_from_headers(resp.headers());

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            self.tracker.note_rate_limited(resp.headers());
        }
        Ok(resp)
    }
}

impl Default for WeightTracker {
    fn default() -> Self {
        Self::new(WeightLimits::default())
    }
}

impl std::fmt::Debug for WeightTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightTracker")
            .field("used_weight_1m", &self.used_weight())
            .field("cooldown", &self.remaining_cooldown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn tracker() -> WeightTracker {
        WeightTracker::new(WeightLimits {
            soft_limit: 100,
            cooldown_ms: 5_000,
        })
    }

    #[test]
    fn reads_weight_header() {
        let t = tracker();
        let mut headers = HeaderMap::new();
        headers.insert(USED_WEIGHT_HEADER, HeaderValue::from_static("42"));
        t.update_from_headers(&headers);
        assert_eq!(t.used_weight(), 42);
        assert!(t.remaining_cooldown().is_none());
    }

    #[test]
    fn ignores_missing_or_garbage_header() {
        let t = tracker();
        let mut headers = HeaderMap::new();
        t.update_from_headers(&headers);
        headers.insert(USED_WEIGHT_HEADER, HeaderValue::from_static("lots"));
        t.update_from_headers(&headers);
        assert_eq!(t.used_weight(), 0);
    }

    #[test]
    fn crossing_soft_limit_opens_cooldown() {
        let t = tracker();
        t.record_weight(150);
        let remaining = t.remaining_cooldown().unwrap();
        assert!(remaining <= Duration::from_millis(5_000));
        assert!(remaining > Duration::from_millis(4_000));
    }

    #[test]
    fn retry_after_extends_but_never_shortens() {
        let t = tracker();
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static("30"));
        t.note_rate_limited(&headers);
        t.record_weight(500);
        assert!(t.remaining_cooldown().unwrap() > Duration::from_secs(20));
    }

    #[tokio::test]
    async fn middleware_records_weight_and_rate_limits() {
        use crate::exchange::retry::{build_http_client, RetryPolicy};
        use crate::exchange::testing::{canned_server, http_response};

        let (base, _) = canned_server(vec![
            http_response(200, &[(USED_WEIGHT_HEADER, "37")], "[]"),
            http_response(429, &[("Retry-After", "30")], ""),
        ])
        .await;

        let t = Arc::new(tracker());
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let client = build_http_client(Duration::from_secs(2), &policy, Some(Arc::clone(&t))).unwrap();

        client.get(format!("{base}/a")).send().await.unwrap();
        assert_eq!(t.used_weight(), 37);
        assert!(t.remaining_cooldown().is_none());

        let resp = client.get(format!("{base}/b")).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 429);
        assert!(t.remaining_cooldown().unwrap() > Duration::from_secs(20));
    }

    #[tokio::test]
    async fn wait_ready_returns_immediately_without_cooldown() {
        let t = tracker();
        tokio::time::timeout(Duration::from_millis(50), t.wait_ready())
            .await
            .unwrap();
    }
}
