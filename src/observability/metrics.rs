//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by outcome, status
//! - `proxy_request_duration_seconds` (histogram): latency by outcome
//! - `route_table_size` (gauge): stored routes
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_table_size(routes: usize) {
    metrics::gauge!("route_table_size").set(routes as f64);
}
