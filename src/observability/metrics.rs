//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_auth_events_total` (counter): security events by kind
//! - `gatekeeper_rate_limited_total` (counter): denied rate-limit checks
//! - `gatekeeper_csrf_validations_total` (counter): validations by result
//! - `gatekeeper_outbound_requests_total` (counter): wrapped calls by outcome
//! - `gatekeeper_outbound_request_duration_seconds` (histogram): call latency
//! - `gatekeeper_dependency_up` (gauge): 1=up, 0.5=degraded, 0=down
//! - `gatekeeper_health_status` (gauge): 2=healthy, 1=degraded, 0=unhealthy
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - Prometheus exporter is opt-in via `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_security_event(kind: &'static str) {
    metrics::counter!("gatekeeper_auth_events_total", "kind" => kind).increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("gatekeeper_rate_limited_total").increment(1);
}

pub fn record_csrf_validation(valid: bool) {
    let result = if valid { "valid" } else { "invalid" };
    metrics::counter!("gatekeeper_csrf_validations_total", "result" => result).increment(1);
}

pub fn record_outbound_request(success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "error" };
    metrics::counter!("gatekeeper_outbound_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gatekeeper_outbound_request_duration_seconds")
        .record(elapsed.as_secs_f64());
}

pub fn record_dependency_status(name: &str, value: f64) {
    metrics::gauge!("gatekeeper_dependency_up", "dependency" => name.to_string()).set(value);
}

pub fn record_health_status(value: f64) {
    metrics::gauge!("gatekeeper_health_status").set(value);
}
