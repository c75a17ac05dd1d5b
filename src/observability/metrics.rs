//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sharing_settings_saves_total` (counter): saves by outcome (merged, noop, error)
//! - `sharing_settings_merges_total` (counter): store merges by result
//! - `sharing_modules_shared` (gauge): modules with stored sharing settings
//! - `sharing_http_requests_total` (counter): requests by route, status
//! - `sharing_http_request_duration_seconds` (histogram): latency by route

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_save(outcome: &'static str) {
    ::metrics::counter!("sharing_settings_saves_total", "outcome" => outcome).increment(1);
}

pub fn record_merge(result: &'static str) {
    ::metrics::counter!("sharing_settings_merges_total", "result" => result).increment(1);
}

pub fn record_shared_modules(count: usize) {
    ::metrics::gauge!("sharing_modules_shared").set(count as f64);
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "sharing_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("sharing_http_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}
