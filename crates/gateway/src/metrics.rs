//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use perch_core::{Error, Result};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Count one finished identification stream.
pub fn track_identify(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("identify_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("identify_duration_seconds", "outcome" => outcome).record(elapsed.as_secs_f64());
}

/// Count one species cache lookup.
pub fn track_cache_lookup(cache: &'static str, result: &'static str) {
    metrics::counter!("species_cache_lookups_total", "cache" => cache, "result" => result).increment(1);
}
