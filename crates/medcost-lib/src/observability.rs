//! Observability infrastructure for the cost estimator
//!
//! Provides:
//! - Prometheus metrics (prediction latency, model vs fallback counts, training runs)
//! - Structured logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, Encoder, GaugeVec, Histogram,
    IntCounter, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for per-request prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05, 0.1,
];

/// Histogram buckets for offline training duration (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EstimatorMetricsInner> = OnceLock::new();

struct EstimatorMetricsInner {
    prediction_latency_seconds: Histogram,
    training_duration_seconds: Histogram,
    model_predictions: IntCounter,
    fallback_predictions: IntCounter,
    training_runs: IntCounter,
    training_failures: IntCounter,
    model_version_info: GaugeVec,
}

impl EstimatorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "medcost_prediction_latency_seconds",
                "Time spent producing a single cost estimate",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            training_duration_seconds: register_histogram!(
                "medcost_training_duration_seconds",
                "Wall time of a full training and evaluation run",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            model_predictions: register_int_counter!(
                "medcost_model_predictions_total",
                "Estimates produced by the trained model"
            )
            .expect("Failed to register model_predictions_total"),

            fallback_predictions: register_int_counter!(
                "medcost_fallback_predictions_total",
                "Estimates produced by the closed-form fallback"
            )
            .expect("Failed to register fallback_predictions_total"),

            training_runs: register_int_counter!(
                "medcost_training_runs_total",
                "Training runs started"
            )
            .expect("Failed to register training_runs_total"),

            training_failures: register_int_counter!(
                "medcost_training_failures_total",
                "Training runs that produced no usable model"
            )
            .expect("Failed to register training_failures_total"),

            model_version_info: register_gauge_vec!(
                "medcost_model_version_info",
                "Information about the currently served model",
                &["version", "kind"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Estimator metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EstimatorMetrics {
    _private: (),
}

impl Default for EstimatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimatorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EstimatorMetricsInner {
        GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_training_duration(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.observe(duration_secs);
    }

    pub fn inc_model_predictions(&self) {
        self.inner().model_predictions.inc();
    }

    pub fn inc_fallback_predictions(&self) {
        self.inner().fallback_predictions.inc();
    }

    pub fn inc_training_runs(&self) {
        self.inner().training_runs.inc();
    }

    pub fn inc_training_failures(&self) {
        self.inner().training_failures.inc();
    }

    /// Update served model info
    pub fn set_model_version(&self, version: &str, kind: &str) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version, kind])
            .set(1.0);
    }

    /// Render the default registry in the Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for estimator events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_version: Option<&str>) {
        info!(
            event = "estimator_started",
            component = %self.component,
            estimator_version = %version,
            model_version = model_version.unwrap_or("fallback"),
            "Cost estimator started"
        );
    }

    pub fn log_model_loaded(&self, version: &str, path: &str) {
        info!(
            event = "model_loaded",
            component = %self.component,
            model_version = %version,
            path = %path,
            "Model artifact installed"
        );
    }

    pub fn log_training_complete(
        &self,
        version: &str,
        rows: usize,
        rmse: Option<f64>,
        r2_test: Option<f64>,
        duration_secs: f64,
    ) {
        info!(
            event = "training_complete",
            component = %self.component,
            model_version = %version,
            dataset_rows = rows,
            rmse = ?rmse,
            r2_test = ?r2_test,
            duration_secs = duration_secs,
            "Model trained and persisted"
        );
    }

    pub fn log_training_failed(&self, reason: &str) {
        warn!(
            event = "training_failed",
            component = %self.component,
            reason = %reason,
            "Training produced no usable model, keeping previous state"
        );
    }

    pub fn log_fallback(&self, reason: &str) {
        warn!(
            event = "fallback_prediction",
            component = %self.component,
            reason = %reason,
            "Serving closed-form fallback estimate"
        );
    }

    pub fn log_prediction(&self, cost: f64, model_version: &str, elapsed_us: u128) {
        debug!(
            event = "prediction_generated",
            component = %self.component,
            predicted_cost = cost,
            model_version = %model_version,
            elapsed_us = elapsed_us as u64,
            "Generated cost estimate"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_metrics_creation() {
        let metrics = EstimatorMetrics::new();
        metrics.observe_prediction_latency(0.0001);
        metrics.observe_training_duration(0.5);
        metrics.inc_model_predictions();
        metrics.inc_fallback_predictions();
        metrics.inc_training_runs();
        metrics.set_model_version("linear_regression-abc", "linear_regression");

        let text = metrics.render();
        assert!(text.contains("medcost_fallback_predictions_total"));
        assert!(text.contains("medcost_prediction_latency_seconds"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("predictor");
        assert_eq!(logger.component, "predictor");
    }
}
