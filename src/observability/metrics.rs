//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, method, status
//! - `proxy_request_duration_seconds` (histogram): latency by route
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for route, method and status code
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Installs the Prometheus exporter on `address`.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;
    tracing::info!(address = %address, "metrics exporter listening");
    Ok(())
}

/// Records one finished exchange.
pub fn record_request(route: &str, method: &str, status: u16, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    metrics::counter!(
        "proxy_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "proxy_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(elapsed);
}
