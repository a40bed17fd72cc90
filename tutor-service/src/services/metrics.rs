//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and provides the tutor-specific series.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Call once at startup before any metrics are recorded. A second call is a
/// no-op.
pub fn init_metrics() -> Result<(), AppError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("failed to install Prometheus recorder: {}", e))
    })?;

    let _ = METRICS_HANDLE.set(handle);
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count a handled question by outcome (`answered`, `canned`, `failed`).
pub fn record_answer(outcome: &'static str) {
    counter!("tutor_answers_total", "outcome" => outcome).increment(1);
}

/// Record latency of one provider exchange, retries included.
pub fn record_provider_latency(provider: &'static str, seconds: f64) {
    histogram!("tutor_provider_latency_seconds", "provider" => provider).record(seconds);
}

pub fn record_provider_error(provider: &'static str, error_type: &'static str) {
    counter!(
        "tutor_provider_errors_total",
        "provider" => provider,
        "error_type" => error_type
    )
    .increment(1);
}

/// Token accounting reported by the provider.
pub fn record_tokens(provider: &'static str, prompt: u32, completion: u32) {
    counter!("tutor_tokens_total", "provider" => provider, "type" => "prompt")
        .increment(u64::from(prompt));
    counter!("tutor_tokens_total", "provider" => provider, "type" => "completion")
        .increment(u64::from(completion));
}
