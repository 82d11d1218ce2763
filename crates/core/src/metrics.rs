//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scan coordination (outcomes, latency, codec failures, point resyncs)
//! - Hydration
//! - Entry-log write-back (retries, drops, conflicts, queue pressure)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Scans
// =============================================================================

/// Scans total by outcome.
pub static SCANS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gatekeeper_scans_total", "Total scans by outcome"),
        &["outcome"], // ScanOutcome::as_str()
    )
    .unwrap()
});

/// End-to-end scan latency in seconds, from lookup to queued fact.
pub static SCAN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("gatekeeper_scan_duration_seconds", "Duration of a scan")
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5,
            ]),
    )
    .unwrap()
});

/// Cache entries that failed to decode.
pub static CODEC_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gatekeeper_codec_errors_total",
        "Cache entries that failed to encode or decode",
    )
    .unwrap()
});

/// Point resyncs of a single ticket from the store, by result.
pub static POINT_RESYNCS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gatekeeper_point_resyncs_total",
            "Single-ticket reloads after a codec failure",
        ),
        &["result"], // "recovered", "missing", "failed"
    )
    .unwrap()
});

// =============================================================================
// Hydration
// =============================================================================

/// Hydration duration in seconds.
pub static HYDRATION_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "gatekeeper_hydration_duration_seconds",
            "Duration of a full cache hydration",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .unwrap()
});

/// Hydrations total by result.
pub static HYDRATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gatekeeper_hydrations_total", "Total hydration attempts"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Write-back
// =============================================================================

/// Entry-log writes retried after a store failure.
pub static WRITE_BACK_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gatekeeper_write_back_retries_total",
        "Entry-log writes retried after a failure",
    )
    .unwrap()
});

/// Entry-log facts dropped after exhausting retries.
pub static WRITE_BACK_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gatekeeper_write_back_dropped_total",
        "Entry-log facts dropped after exhausting retries",
    )
    .unwrap()
});

/// Facts whose cache version was ahead of the live cache entry.
pub static WRITE_BACK_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gatekeeper_write_back_conflicts_total",
        "Entry-log facts produced from a cache version no longer held",
    )
    .unwrap()
});

/// Facts rejected because the write-back queue was full.
pub static WRITE_BACK_QUEUE_FULL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gatekeeper_write_back_queue_full_total",
        "Entry-log facts lost to a full write-back queue",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scans
        Box::new(SCANS_TOTAL.clone()),
        Box::new(SCAN_DURATION.clone()),
        Box::new(CODEC_ERRORS.clone()),
        Box::new(POINT_RESYNCS.clone()),
        // Hydration
        Box::new(HYDRATION_DURATION.clone()),
        Box::new(HYDRATIONS_TOTAL.clone()),
        // Write-back
        Box::new(WRITE_BACK_RETRIES.clone()),
        Box::new(WRITE_BACK_DROPPED.clone()),
        Box::new(WRITE_BACK_CONFLICTS.clone()),
        Box::new(WRITE_BACK_QUEUE_FULL.clone()),
    ]
}
