//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reqbin_captures_total` (counter): captures by outcome
//! - `reqbin_capture_duration_seconds` (histogram): normalize + append latency
//! - `reqbin_stored_records` (gauge): records currently retained
//! - `reqbin_active_subscribers` (gauge): live viewers
//! - `reqbin_events_published_total` (counter): events delivered to viewers
//! - `reqbin_subscriber_closed_total` (counter): teardowns by reason
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of one capture.
pub fn record_capture(outcome: &'static str, start: Instant) {
    counter!("reqbin_captures_total", "outcome" => outcome).increment(1);
    histogram!("reqbin_capture_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_stored_records(count: usize) {
    gauge!("reqbin_stored_records").set(count as f64);
}

pub fn record_active_subscribers(count: usize) {
    gauge!("reqbin_active_subscribers").set(count as f64);
}

pub fn record_event_published(delivered: usize) {
    counter!("reqbin_events_published_total").increment(delivered as u64);
}

pub fn record_subscriber_closed(reason: &'static str) {
    counter!("reqbin_subscriber_closed_total", "reason" => reason).increment(1);
}
