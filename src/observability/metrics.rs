//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fleet_remote_calls_total` (counter): remote calls by method, server, outcome
//! - `fleet_remote_call_duration_seconds` (histogram): remote call latency by method
//! - `fleet_fanout_failures_total` (counter): per-server task failures by operation
//! - `fleet_conflicts_total` (counter): rejected guarded updates by record kind
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_remote_call(method: &'static str, server: &str, ok: bool, start: Instant) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        "fleet_remote_calls_total",
        "method" => method,
        "server" => server.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("fleet_remote_call_duration_seconds", "method" => method)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fanout_failure(operation: &str) {
    counter!("fleet_fanout_failures_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_conflict(kind: &'static str) {
    counter!("fleet_conflicts_total", "kind" => kind).increment(1);
}
