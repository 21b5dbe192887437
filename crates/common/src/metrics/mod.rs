//! Metrics and observability utilities
//!
//! Prometheus metric names share the [`METRICS_PREFIX`]. Recording is a
//! no-op until an exporter is installed, so library code records freely.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all QuillForge metrics
pub const METRICS_PREFIX: &str = "quillforge";

/// Buckets for generation latency (model calls are slow)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m, request timeout
];

/// Full name of the generation latency histogram
pub fn generation_duration_metric() -> String {
    format!("{}_generation_duration_seconds", METRICS_PREFIX)
}

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Article generation attempts by outcome"
    );

    describe_histogram!(
        generation_duration_metric(),
        Unit::Seconds,
        "Article generation latency in seconds"
    );

    describe_counter!(
        format!("{}_posts_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total posts persisted"
    );

    describe_counter!(
        format!("{}_users_registered_total", METRICS_PREFIX),
        Unit::Count,
        "Total accounts registered"
    );

    tracing::info!("Metrics registered");
}

/// Record one generation attempt; `outcome` is `success` or a failure kind
pub fn record_generation(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(generation_duration_metric(), "outcome" => outcome.to_string())
        .record(duration_secs);
}

pub fn record_post_created() {
    counter!(format!("{}_posts_created_total", METRICS_PREFIX)).increment(1);
}

pub fn record_user_registered() {
    counter!(format!("{}_users_registered_total", METRICS_PREFIX)).increment(1);
}
