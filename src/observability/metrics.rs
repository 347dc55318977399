//! Metrics collection and exposition.
//!
//! # Metrics
//! - `smart_transport_requests_total` (counter): dispatches by route, outcome
//! - `smart_transport_request_duration_seconds` (histogram): latency by route
//! - `smart_transport_breadcrumbs_total` (counter): stamped responses by mode
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is optional and installed by the binary

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatch through the smart transport.
pub fn record_dispatch(route: &'static str, success: bool, start: Instant) {
    let outcome = if success { "ok" } else { "error" };
    counter!("smart_transport_requests_total", "route" => route, "outcome" => outcome).increment(1);
    histogram!("smart_transport_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// Record a response that received breadcrumbs.
pub fn record_breadcrumb(mode: &'static str) {
    counter!("smart_transport_breadcrumbs_total", "mode" => mode).increment(1);
}
