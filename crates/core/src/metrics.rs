//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission gate (rejections, batches in flight)
//! - Batch multiplexer (outcomes, durations, sizes)
//! - Outbound fetches (status, duration, in flight)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Admission Metrics
// =============================================================================

/// Batches rejected because the admission gate was exhausted.
pub static ADMISSION_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "multiplexer_admission_rejections_total",
        "Total batches rejected by the admission gate",
    )
    .unwrap()
});

/// Batches currently holding an admission ticket.
pub static BATCHES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "multiplexer_batches_in_flight",
        "Number of batches currently admitted",
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batches processed total by result.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("multiplexer_batches_total", "Total batches processed"),
        &["result"], // "success", "validation", "rejected", "fetch_error", "cancelled", "deadline", "internal"
    )
    .unwrap()
});

/// Batch duration in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "multiplexer_batch_duration_seconds",
            "Duration of batch processing",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["result"],
    )
    .unwrap()
});

/// Targets per batch.
pub static BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("multiplexer_batch_size", "Number of targets per batch")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]),
    )
    .unwrap()
});

// =============================================================================
// Fetch Metrics
// =============================================================================

/// Fetches total by status.
pub static FETCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("multiplexer_fetches_total", "Total outbound fetches"),
        &["status"], // "success", "error", "cancelled", "skipped"
    )
    .unwrap()
});

/// Fetch duration in seconds.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "multiplexer_fetch_duration_seconds",
            "Duration of outbound fetches",
        )
        .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["status"],
    )
    .unwrap()
});

/// Fetches currently holding a fetch slot.
pub static FETCHES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "multiplexer_fetches_in_flight",
        "Number of outbound fetches currently in flight",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Admission
        Box::new(ADMISSION_REJECTIONS.clone()),
        Box::new(BATCHES_IN_FLIGHT.clone()),
        // Batches
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(BATCH_SIZE.clone()),
        // Fetches
        Box::new(FETCHES_TOTAL.clone()),
        Box::new(FETCH_DURATION.clone()),
        Box::new(FETCHES_IN_FLIGHT.clone()),
    ]
}
