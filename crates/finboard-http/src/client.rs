//! Widget API client.
//!
//! One GET per call, consulting the response cache and the rate limiter.
//! Every failure is normalized into a [`FeedError`]; nothing else escapes.

use crate::cache::{cache_key, ResponseCache};
use crate::rate_limiter::RateLimiter;
use finboard_core::{adapt_api_response, AdaptedResponse, FeedError, FeedResult};
use finboard_telemetry::Metrics;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// HTTP fetcher configuration (`[http]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiClientConfig {
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Cache entry lifetime.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,
    /// Requests admitted per URL per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Whole-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_ms() -> u64 {
    30_000
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_true(),
            cache_ttl_ms: default_cache_ttl_ms(),
            rate_limit_enabled: default_true(),
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ApiClientConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Cached, rate-limited fetcher for widget APIs.
///
/// Cheap to clone: clones share the connection pool, cache and limiter.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiClientConfig,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
}

impl ApiClient {
    /// Create a client over a shared cache and limiter.
    pub fn new(
        config: ApiClientConfig,
        cache: Arc<ResponseCache>,
        limiter: Arc<RateLimiter>,
    ) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FeedError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            cache,
            limiter,
        })
    }

    /// Create a client with its own cache and limiter.
    pub fn with_config(config: ApiClientConfig) -> FeedResult<Self> {
        Self::new(
            config,
            Arc::new(ResponseCache::new()),
            Arc::new(RateLimiter::new()),
        )
    }

    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch `url` and adapt the payload.
    ///
    /// With `use_cache` a live cache entry short-circuits the network and
    /// the rate limiter; a successful network payload is stored back.
    pub async fn fetch(&self, url: &str, use_cache: bool) -> FeedResult<AdaptedResponse> {
        let caching = use_cache && self.config.cache_enabled;
        let key = cache_key(url);

        if caching {
            if let Some(cached) = self.cache.get(&key) {
                debug!(url, "Serving from cache");
                Metrics::cache_hit();
                return adapt_api_response(cached);
            }
            Metrics::cache_miss();
        }

        if self.config.rate_limit_enabled
            && !self
                .limiter
                .check_and_consume(url, self.config.max_requests, self.config.window())
        {
            let reset_at = self.limiter.reset_time_of(url);
            warn!(url, ?reset_at, "Local rate limit exceeded");
            Metrics::rate_limited();
            return Err(FeedError::RateLimited { reset_at });
        }

        let started = Instant::now();
        let result = self.get_json(url).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => Metrics::fetch_completed("ok", latency_ms),
            Err(e) => {
                warn!(url, error = %e, kind = e.kind(), "Fetch failed");
                Metrics::fetch_completed(e.kind(), latency_ms);
            }
        }

        let payload = result?;
        if caching {
            self.cache.set(key, payload.clone(), self.config.cache_ttl());
        }
        adapt_api_response(payload)
    }

    /// Fetch without the cache, for validating a URL before it is saved.
    pub async fn test_connection(&self, url: &str) -> FeedResult<AdaptedResponse> {
        self.fetch(url, false).await
    }

    /// Drop the cached payload of `url`.
    pub fn clear_cache_for_url(&self, url: &str) {
        self.cache.clear(&cache_key(url));
    }

    async fn get_json(&self, url: &str) -> FeedResult<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::UpstreamRateLimited);
        }
        if !status.is_success() {
            return Err(FeedError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                FeedError::InvalidResponseShape
            } else {
                classify_transport_error(e)
            }
        })
    }
}

/// Map a reqwest error that produced no usable response.
fn classify_transport_error(e: reqwest::Error) -> FeedError {
    if e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() {
        FeedError::Network {
            detail: e.to_string(),
        }
    } else {
        FeedError::Other(e.to_string())
    }
}
