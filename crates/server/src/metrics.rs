//! Prometheus metrics for the spool server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! It exposes aggregate counters only (no claim names or hashes), but should
//! still be network-restricted to the scrapers.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Delivery
pub static STREAMS_RUNNING: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "spool_streams_running",
        "Number of response bodies currently being delivered",
    )
    .expect("metric creation failed")
});

pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("spool_stream_requests_total", "Stream requests by status code"),
        &["status"],
    )
    .expect("metric creation failed")
});

pub static BYTES_SERVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("spool_bytes_served_total", "Total body bytes written")
        .expect("metric creation failed")
});

pub static STREAM_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("spool_stream_errors_total", "Failed stream requests by error kind"),
        &["kind"],
    )
    .expect("metric creation failed")
});

// Hot cache, sampled on scrape
pub static HOT_CACHE_HITS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("spool_hot_cache_hits", "Hot cache hits since start")
        .expect("metric creation failed")
});

pub static HOT_CACHE_MISSES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("spool_hot_cache_misses", "Hot cache misses since start")
        .expect("metric creation failed")
});

pub static HOT_CACHE_DEDUPLICATED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "spool_hot_cache_deduplicated",
        "Requests that joined an in-flight fetch since start",
    )
    .expect("metric creation failed")
});

pub static HOT_CACHE_EVICTIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("spool_hot_cache_evictions", "Hot cache evictions since start")
        .expect("metric creation failed")
});

pub static HOT_CACHE_BYTES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("spool_hot_cache_bytes", "Bytes held in the hot cache")
        .expect("metric creation failed")
});

pub static HOT_CACHE_CAPACITY: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("spool_hot_cache_capacity_bytes", "Hot cache capacity")
        .expect("metric creation failed")
});

// Resolve cache, sampled on scrape
pub static RESOLVE_CACHE_HITS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("spool_resolve_cache_hits", "Resolve cache hits since start")
        .expect("metric creation failed")
});

pub static RESOLVE_CACHE_MISSES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("spool_resolve_cache_misses", "Resolve cache misses since start")
        .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER: Once = Once::new();

/// Register all metrics with the global registry.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(STREAMS_RUNNING.clone()),
            Box::new(REQUESTS.clone()),
            Box::new(BYTES_SERVED.clone()),
            Box::new(STREAM_ERRORS.clone()),
            Box::new(HOT_CACHE_HITS.clone()),
            Box::new(HOT_CACHE_MISSES.clone()),
            Box::new(HOT_CACHE_DEDUPLICATED.clone()),
            Box::new(HOT_CACHE_EVICTIONS.clone()),
            Box::new(HOT_CACHE_BYTES.clone()),
            Box::new(HOT_CACHE_CAPACITY.clone()),
            Box::new(RESOLVE_CACHE_HITS.clone()),
            Box::new(RESOLVE_CACHE_MISSES.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

fn to_gauge(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Copy cache statistics into their gauges.
pub fn sample_caches(state: &AppState) {
    let hot = state.player.hot_cache().stats();
    HOT_CACHE_HITS.set(to_gauge(hot.hits));
    HOT_CACHE_MISSES.set(to_gauge(hot.misses));
    HOT_CACHE_DEDUPLICATED.set(to_gauge(hot.deduplicated));
    HOT_CACHE_EVICTIONS.set(to_gauge(hot.evictions));
    HOT_CACHE_BYTES.set(to_gauge(hot.bytes));
    HOT_CACHE_CAPACITY.set(to_gauge(hot.capacity));

    let resolve = state.player.resolve_cache();
    RESOLVE_CACHE_HITS.set(to_gauge(resolve.hits()));
    RESOLVE_CACHE_MISSES.set(to_gauge(resolve.misses()));
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    sample_caches(&state);

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

pub fn record_request(status: StatusCode) {
    REQUESTS.with_label_values(&[status.as_str()]).inc();
}

pub fn record_stream_error(kind: &str) {
    STREAM_ERRORS.with_label_values(&[kind]).inc();
}

/// Counts a body as running for as long as it is alive.
pub struct RunningStream;

impl RunningStream {
    pub fn start() -> Self {
        STREAMS_RUNNING.inc();
        Self
    }
}

impl Drop for RunningStream {
    fn drop(&mut self) {
        STREAMS_RUNNING.dec();
    }
}
