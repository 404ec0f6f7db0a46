//! Prometheus metrics for Mirage.
//!
//! Tracks registrations, expirations, served requests and render failures.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Requests answered on the serving surface
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mirage_requests_total",
        "Total number of requests answered by the stub server",
        &["method", "status", "outcome"]  // outcome: served|route_not_bound|configuration_missing
    )
    .unwrap();

    /// Configuration registrations
    pub static ref REGISTRATIONS_TOTAL: CounterVec = register_counter_vec!(
        "mirage_registrations_total",
        "Total number of configuration registrations",
        &["result"]  // result: created|replaced|rejected
    )
    .unwrap();

    /// Configurations removed
    pub static ref REMOVALS_TOTAL: CounterVec = register_counter_vec!(
        "mirage_removals_total",
        "Total number of configuration removals",
        &["reason", "result"]  // reason: ttl|admin, result: removed|absent
    )
    .unwrap();

    /// Configurations currently active
    pub static ref ACTIVE_CONFIGURATIONS: Gauge = register_gauge!(
        "mirage_active_configurations",
        "Number of configurations currently registered"
    )
    .unwrap();

    /// Routes bound at the router level
    pub static ref ROUTE_BINDINGS: Gauge = register_gauge!(
        "mirage_route_bindings",
        "Number of (method, path) pairs bound in the router"
    )
    .unwrap();

    /// Template render failures
    pub static ref RENDER_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "mirage_render_failures_total",
        "Total number of body templates that failed to render",
        &["method"]
    )
    .unwrap();

    /// Configured response delays
    pub static ref RESPONSE_DELAY_MS: Histogram = register_histogram!(
        "mirage_response_delay_ms",
        "Histogram of configured response delays in milliseconds",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record an answered request
pub fn record_request(method: &str, status: u16, outcome: &str) {
    REQUESTS_TOTAL
        .with_label_values(&[method, &status.to_string(), outcome])
        .inc();
}

/// Helper to record a registration outcome
pub fn record_registration(result: &str) {
    REGISTRATIONS_TOTAL.with_label_values(&[result]).inc();
}

/// Helper to record a removal
pub fn record_removal(reason: &str, removed: bool) {
    let result = if removed { "removed" } else { "absent" };
    REMOVALS_TOTAL.with_label_values(&[reason, result]).inc();
}

pub fn set_active_configurations(count: usize) {
    ACTIVE_CONFIGURATIONS.set(count as f64);
}

pub fn set_route_bindings(count: usize) {
    ROUTE_BINDINGS.set(count as f64);
}

/// Helper to record a template render failure
pub fn record_render_failure(method: &str) {
    RENDER_FAILURES_TOTAL.with_label_values(&[method]).inc();
}

/// Helper to record a configured delay
pub fn record_delay(duration_ms: u64) {
    RESPONSE_DELAY_MS.observe(duration_ms as f64);
}
