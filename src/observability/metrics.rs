//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wsrest_connections_active` (gauge): live WebSocket connections
//! - `wsrest_connections_total` (counter): accepted connections
//! - `wsrest_requests_total` (counter): decoded request envelopes
//! - `wsrest_responses_total` (counter): responses written, by status
//! - `wsrest_handlers_in_flight` (gauge): handlers currently running
//! - `wsrest_handler_duration_seconds` (histogram): handler latency
//! - `wsrest_handler_panics_total` (counter): handlers that panicked
//! - `wsrest_errors_total` (counter): pipeline errors, by kind
//!
//! # Design Decisions
//! - Thin wrappers over the `metrics` macros; callers never see metric names
//! - Nothing is recorded until a recorder is installed (`init_metrics`)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const CONNECTIONS_ACTIVE: &str = "wsrest_connections_active";
pub const CONNECTIONS_TOTAL: &str = "wsrest_connections_total";
pub const REQUESTS_TOTAL: &str = "wsrest_requests_total";
pub const RESPONSES_TOTAL: &str = "wsrest_responses_total";
pub const HANDLERS_IN_FLIGHT: &str = "wsrest_handlers_in_flight";
pub const HANDLER_DURATION: &str = "wsrest_handler_duration_seconds";
pub const HANDLER_PANICS: &str = "wsrest_handler_panics_total";
pub const ERRORS_TOTAL: &str = "wsrest_errors_total";

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_opened() {
    counter!(CONNECTIONS_TOTAL).increment(1);
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

pub fn record_connection_closed() {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

pub fn record_request() {
    counter!(REQUESTS_TOTAL).increment(1);
}

pub fn record_response(status: u16) {
    counter!(RESPONSES_TOTAL, "status" => status.to_string()).increment(1);
}

/// Mark a handler as started; pair with [`record_handler_finished`].
pub fn record_handler_started() {
    gauge!(HANDLERS_IN_FLIGHT).increment(1.0);
}

pub fn record_handler_finished(started: Instant) {
    gauge!(HANDLERS_IN_FLIGHT).decrement(1.0);
    histogram!(HANDLER_DURATION).record(started.elapsed().as_secs_f64());
}

pub fn record_handler_panic() {
    counter!(HANDLER_PANICS).increment(1);
}

pub fn record_pipeline_error(kind: &'static str) {
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}
