//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, operation
//! - `gateway_request_duration_seconds` (histogram): latency by operation
//! - `gateway_upstream_calls_total` (counter): verifier/backend calls by outcome
//! - `gateway_upstream_duration_seconds` (histogram): downstream call latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users and
//!   tests pay nothing
//! - Labels are low-cardinality: operation ids, never raw paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record a completed gateway request.
pub fn record_request(method: &str, status: u16, operation: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a call to the identity verifier or the release service.
pub fn record_upstream(upstream: &'static str, outcome: &'static str, start: Instant) {
    counter!(
        "gateway_upstream_calls_total",
        "upstream" => upstream,
        "outcome" => outcome
    )
    .increment(1);

    histogram!("gateway_upstream_duration_seconds", "upstream" => upstream)
        .record(start.elapsed().as_secs_f64());
}
