//! Prometheus metrics for the diagnosis server.
//!
//! Metrics live in a crate-level registry and are exported in text format
//! at `GET /metrics`.
//!
//! # Example
//! ```no_run
//! use dx_predictor::metrics::PREDICTIONS_TOTAL;
//!
//! PREDICTIONS_TOTAL
//!     .with_label_values(&["Dengue", "High"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

const NAMESPACE: &str = "dx_predictor";

lazy_static! {
    /// Registry for all metrics in this crate
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Successful predictions
    ///
    /// Labels: diagnosis, severity
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of successful predictions")
            .namespace(NAMESPACE),
        &["diagnosis", "severity"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Rejected prediction requests
    ///
    /// Labels: error_code
    pub static ref PREDICTION_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("prediction_failures_total", "Total number of failed prediction requests")
            .namespace(NAMESPACE),
        &["error_code"]
    ).expect("Failed to create PREDICTION_FAILURES_TOTAL metric");

    /// Time spent building, scaling and scoring one record
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction latency in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0])
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// 1 once artifacts are loaded
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a trained model is loaded")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");
}

/// Register all metrics with the registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PREDICTIONS_TOTAL.clone()),
        Box::new(PREDICTION_FAILURES_TOTAL.clone()),
        Box::new(PREDICTION_DURATION_SECONDS.clone()),
        Box::new(MODEL_LOADED.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Encode the registry in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
