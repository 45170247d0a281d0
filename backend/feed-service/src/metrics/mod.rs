//! Feed Service Metrics
//!
//! Prometheus metrics for feed reads, cache coherency and the popular feed refresher

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Encoder, Histogram,
    HistogramVec, IntCounterVec, TextEncoder,
};
use std::time::Duration;

use crate::error::ExploreLeg;
use crate::models::FeedKind;

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_requests_total",
        "Total feed reads by kind and outcome",
        &["kind", "outcome"]
    )
    .expect("Failed to register feed requests metric")
});

static CACHE_LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_cache_lookups_total",
        "Feed cache lookups (hit/hit_empty/miss/error)",
        &["kind", "result"]
    )
    .expect("Failed to register feed cache lookups metric")
});

static CACHE_WRITE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_cache_write_failures_total",
        "Background cache population failures",
        &["kind", "reason"]
    )
    .expect("Failed to register feed cache write failures metric")
});

static EXPLORE_LEG_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_explore_leg_failures_total",
        "Failed explore feed legs",
        &["leg"]
    )
    .expect("Failed to register explore leg failures metric")
});

static REFRESH_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "popular_feed_refresh_runs_total",
        "Popular feed refresh cycles (success/error/timeout)",
        &["status"]
    )
    .expect("Failed to register popular feed refresh runs metric")
});

static REFRESH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "popular_feed_refresh_duration_seconds",
        "Duration of popular feed refresh cycles",
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register popular feed refresh duration metric")
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_service_http_request_duration_seconds",
        "HTTP request latency for feed-service",
        &["method", "path", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register feed-service HTTP duration metric")
});

/// Record a feed read outcome (success or an error kind)
pub fn record_feed_request(kind: FeedKind, outcome: &str) {
    FEED_REQUESTS_TOTAL
        .with_label_values(&[kind.as_str(), outcome])
        .inc();
}

/// Record a cache lookup result
pub fn record_cache_lookup(kind: FeedKind, result: &str) {
    CACHE_LOOKUPS_TOTAL
        .with_label_values(&[kind.as_str(), result])
        .inc();
}

/// Record a failed background cache write (error/timeout)
pub fn record_cache_write_failure(kind: FeedKind, reason: &str) {
    CACHE_WRITE_FAILURES_TOTAL
        .with_label_values(&[kind.as_str(), reason])
        .inc();
}

pub fn record_explore_leg_failure(leg: ExploreLeg) {
    EXPLORE_LEG_FAILURES_TOTAL
        .with_label_values(&[leg.as_str()])
        .inc();
}

/// Record refresh cycle result (success/error/timeout)
pub fn record_refresh_run(status: &str) {
    REFRESH_RUNS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_refresh_duration(duration: Duration) {
    REFRESH_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
