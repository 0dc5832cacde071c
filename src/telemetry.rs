//! Metrics for provider calls and the chat API
//!
//! Counters are recorded with the `metrics` macros at the call sites. With
//! no exporter installed they are no-ops.
//!
//! # Metrics
//!
//! - `bharat_provider_requests_total`: chat completions requested, by backend
//! - `bharat_provider_retries_total`: overload retries, by operation
//! - `bharat_provider_failures_total`: failed chat completions, by backend and error type
//! - `bharat_exchanges_total`: exchanges persisted by the server, by whether a chat was created
//! - `bharat_worker_updates_total`: worker script changes detected

/// Install the Prometheus exporter
///
/// Only has an effect when compiled with the `prometheus` feature; safe to
/// call otherwise. Must run inside a Tokio runtime.
///
/// # Examples
///
/// ```
/// use bharat_ai::telemetry::init_metrics_exporter;
///
/// init_metrics_exporter();
/// ```
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        match builder.install() {
            Ok(()) => tracing::info!("Prometheus exporter installed"),
            Err(e) => tracing::warn!("Failed to install Prometheus exporter: {}", e),
        }
    }
}
