//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the multiplexer server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Admission and fetch slot occupancy (collected at scrape time)
//! - Core batch and fetch metrics (registered from `multiplexer_core`)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "multiplexer_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("multiplexer_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "multiplexer_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Capacity Metrics
// =============================================================================

/// Admission tickets still available.
pub static ADMISSION_AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "multiplexer_admission_available",
        "Admission tickets currently available",
    )
    .unwrap()
});

/// Shared fetch slots still available (only set with a global slot pool).
pub static FETCH_SLOTS_AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "multiplexer_fetch_slots_available",
        "Shared fetch slots currently available",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Capacity
    registry
        .register(Box::new(ADMISSION_AVAILABLE.clone()))
        .unwrap();
    registry
        .register(Box::new(FETCH_SLOTS_AVAILABLE.clone()))
        .unwrap();

    // Core metrics (admission, batches, fetches)
    for metric in multiplexer_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the capacity gauges reflect the moment of the
/// scrape.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let dispatcher = state.dispatcher();
    ADMISSION_AVAILABLE.set(dispatcher.gate().available() as i64);

    if let Some(pool) = dispatcher.multiplexer().shared_slots() {
        FETCH_SLOTS_AVAILABLE.set(pool.available() as i64);
    }
}
