//! Prometheus metrics for finboard.
//!
//! Covers:
//! - HTTP fetch outcomes and latency
//! - Response cache hits and misses
//! - Local rate-limit denials
//! - Stream connection state and reconnects
//! - Active subscriptions and widget updates
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means duplicate metric
//! names, which is a startup bug; it can only happen during static
//! initialization.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

/// HTTP fetches by outcome.
/// Labels: outcome (ok/cached/network/http/rate_limited/...)
pub static FETCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "finboard_fetch_total",
        "Total widget API fetches by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Network fetch latency in milliseconds.
pub static FETCH_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "finboard_fetch_latency_ms",
        "Upstream fetch latency in milliseconds",
        &["outcome"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Response cache hits.
pub static CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("finboard_cache_hits_total", "Response cache hits").unwrap()
});

/// Response cache misses (absent or expired).
pub static CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("finboard_cache_misses_total", "Response cache misses").unwrap()
});

/// Requests denied by the local rate limiter.
pub static RATE_LIMITED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "finboard_rate_limited_total",
        "Requests denied by the local rate limiter"
    )
    .unwrap()
});

/// Open stream connections.
pub static STREAMS_OPEN: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("finboard_streams_open", "Open stream connections").unwrap()
});

/// Stream reconnects.
/// Labels: kind (client = in-client backoff, resubscribe = manager retry)
pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "finboard_stream_reconnect_total",
        "Stream reconnect attempts",
        &["kind"]
    )
    .unwrap()
});

/// Active widget subscriptions.
pub static ACTIVE_SUBSCRIPTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "finboard_active_subscriptions",
        "Active widget feed subscriptions"
    )
    .unwrap()
});

/// Updates delivered to widgets.
/// Labels: result (data/error)
pub static WIDGET_UPDATES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "finboard_widget_updates_total",
        "Feed updates delivered to widgets",
        &["result"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a completed network fetch.
    pub fn fetch_completed(outcome: &str, latency_ms: f64) {
        FETCH_TOTAL.with_label_values(&[outcome]).inc();
        FETCH_LATENCY_MS
            .with_label_values(&[outcome])
            .observe(latency_ms);
    }

    /// Record a fetch served from cache.
    pub fn cache_hit() {
        CACHE_HITS_TOTAL.inc();
        FETCH_TOTAL.with_label_values(&["cached"]).inc();
    }

    pub fn cache_miss() {
        CACHE_MISSES_TOTAL.inc();
    }

    /// Record a local rate-limit denial.
    pub fn rate_limited() {
        RATE_LIMITED_TOTAL.inc();
        FETCH_TOTAL.with_label_values(&["rate_limited"]).inc();
    }

    pub fn stream_opened() {
        STREAMS_OPEN.inc();
    }

    pub fn stream_closed() {
        STREAMS_OPEN.dec();
    }

    /// Record a stream reconnect.
    pub fn stream_reconnect(kind: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn set_active_subscriptions(count: usize) {
        ACTIVE_SUBSCRIPTIONS.set(count as i64);
    }

    /// Record an update pushed to a widget.
    pub fn widget_update(is_error: bool) {
        let result = if is_error { "error" } else { "data" };
        WIDGET_UPDATES_TOTAL.with_label_values(&[result]).inc();
    }
}

/// Encode every registered metric in the Prometheus text format.
pub fn encode_metrics() -> TelemetryResult<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::TelemetryError::Metrics(e.to_string()))
}
