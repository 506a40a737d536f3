//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define access log and variable metrics
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `accesslog_lines_total` (counter): lines written, by output
//! - `accesslog_dropped_total` (counter): lines skipped while disabled, by output
//! - `accesslog_write_errors_total` (counter): failed writes, by output
//! - `variable_errors_total` (counter): failed evaluations, by variable
//! - `accesslog_sinks` (gauge): registered sinks
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - Labels are output keys and variable names, both bounded by config

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_access_log_line(output: &str) {
    ::metrics::counter!("accesslog_lines_total", "output" => output.to_string()).increment(1);
}

pub fn record_access_log_dropped(output: &str) {
    ::metrics::counter!("accesslog_dropped_total", "output" => output.to_string()).increment(1);
}

pub fn record_access_log_write_error(output: &str) {
    ::metrics::counter!("accesslog_write_errors_total", "output" => output.to_string())
        .increment(1);
}

pub fn record_variable_error(variable: &str) {
    ::metrics::counter!("variable_errors_total", "variable" => variable.to_string()).increment(1);
}

pub fn record_access_log_sinks(count: usize) {
    ::metrics::gauge!("accesslog_sinks").set(count as f64);
}
