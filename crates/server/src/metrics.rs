//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the gatekeeper server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Cache population (collected at scrape time)
//! - Core scan, hydration and write-back metrics (registered from the core crate)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use gatekeeper_core::EntryState;

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
            "gatekeeper_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gatekeeper_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "gatekeeper_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics
// =============================================================================

/// Tickets currently cached (collected dynamically).
pub static CACHED_TICKETS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("gatekeeper_cached_tickets", "Number of tickets in the cache").unwrap()
});

/// Cached people by entry state (collected dynamically).
pub static CACHED_PEOPLE_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "gatekeeper_cached_people_by_state",
            "Team members and concert guests in the cache by entry state",
        ),
        &["state"],
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

    // Cache
    registry
        .register(Box::new(CACHED_TICKETS.clone()))
        .unwrap();
    registry
        .register(Box::new(CACHED_PEOPLE_BY_STATE.clone()))
        .unwrap();

    // Core metrics (scans, hydration, write-back)
    for metric in gatekeeper_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the cache gauges reflect the live population.
/// Reads the cache's running counters; nothing is decoded.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    CACHED_TICKETS.set(state.cache().len().await as i64);

    let stats = state.cache().stats();

    for entry_state in EntryState::ALL {
        let count = stats.people_by_state.get(&entry_state).copied().unwrap_or(0);
        CACHED_PEOPLE_BY_STATE
            .with_label_values(&[entry_state.as_str()])
            .set(count as i64);
    }
}

/// Normalize a path for metric labels (replace ticket codes and IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let ticket_regex = regex_lite::Regex::new(r"/tickets/[^/]+").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = ticket_regex.replace_all(path, "/tickets/{code}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}
