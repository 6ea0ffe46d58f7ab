//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tee_primary_requests_total` (counter): primary requests by method, status
//! - `tee_primary_request_duration_seconds` (histogram): primary latency
//! - `tee_shadow_jobs_enqueued_total` (counter): mirrored requests queued
//! - `tee_shadow_deliveries_total` (counter): shadow outcomes (delivered, failed, panicked)
//! - `tee_transports_created_total` (counter): transports built, by scheme
//!
//! Recording is a no-op until an exporter is installed, so the hot path
//! never depends on the exporter being configured.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_primary_request(method: &str, status: u16, start: Instant) {
    counter!(
        "tee_primary_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("tee_primary_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_shadow_enqueued() {
    counter!("tee_shadow_jobs_enqueued_total").increment(1);
}

pub fn record_shadow_delivery(outcome: &'static str) {
    counter!("tee_shadow_deliveries_total", "outcome" => outcome).increment(1);
}

pub fn record_transport_created(scheme: &'static str) {
    counter!("tee_transports_created_total", "scheme" => scheme).increment(1);
}
