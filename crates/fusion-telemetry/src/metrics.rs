//! Prometheus metrics for the fusion engine.
//!
//! All metrics follow the naming convention: `qh_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: sample and attempt totals
//! - **Gauge**: batches currently on a worker
//! - **Histogram**: batch latency, applied quantum weight

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use qh_fusion_engine::{BatchReport, FailureReason};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SCHEDULER METRICS
    // =========================================================================

    /// Samples accepted for processing
    pub static ref SAMPLES_SUBMITTED: Counter = Counter::new(
        "qh_scheduler_samples_submitted_total",
        "Total samples accepted for processing"
    ).expect("metric creation failed");

    /// Batches that produced a report
    pub static ref BATCHES_COMPLETED: Counter = Counter::new(
        "qh_scheduler_batches_completed_total",
        "Total batches that produced a report"
    ).expect("metric creation failed");

    /// Samples lost to worker crashes
    pub static ref WORKER_FAILURES: Counter = Counter::new(
        "qh_scheduler_worker_failures_total",
        "Samples failed because their worker crashed"
    ).expect("metric creation failed");

    /// Samples cancelled by shutdown
    pub static ref SAMPLES_CANCELLED: Counter = Counter::new(
        "qh_scheduler_samples_cancelled_total",
        "Samples cancelled before completion"
    ).expect("metric creation failed");

    /// Malformed samples rejected from the input stream
    pub static ref SAMPLES_REJECTED: Counter = Counter::new(
        "qh_scheduler_samples_rejected_total",
        "Samples rejected before batching"
    ).expect("metric creation failed");

    /// Batches currently being processed
    pub static ref ACTIVE_WORKERS: Gauge = Gauge::new(
        "qh_scheduler_active_workers",
        "Batches currently being processed"
    ).expect("metric creation failed");

    /// Batch processing duration
    pub static ref BATCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "qh_scheduler_batch_duration_seconds",
            "Wall time from dispatch to report per batch"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0])
    ).expect("metric creation failed");

    // =========================================================================
    // PATH METRICS
    // =========================================================================

    /// Classical failures by reason
    pub static ref CLASSICAL_FAILURES: CounterVec = CounterVec::new(
        Opts::new("qh_classical_failures_total", "Samples without a classical result"),
        &["reason"]  // reason: numeric-divergence/model-error
    ).expect("metric creation failed");

    /// Samples whose quantum path degraded
    pub static ref QUANTUM_DEGRADED: Counter = Counter::new(
        "qh_quantum_degraded_total",
        "Samples fused without a quantum contribution"
    ).expect("metric creation failed");

    /// Quantum simulation attempts, retries included
    pub static ref QUANTUM_ATTEMPTS: Counter = Counter::new(
        "qh_quantum_attempts_total",
        "Total quantum simulation attempts"
    ).expect("metric creation failed");

    // =========================================================================
    // FUSION METRICS
    // =========================================================================

    /// Samples with a fused result
    pub static ref SAMPLES_FUSED: Counter = Counter::new(
        "qh_fusion_samples_fused_total",
        "Total samples with a fused result"
    ).expect("metric creation failed");

    /// Weight applied to the quantum vector
    pub static ref EFFECTIVE_WEIGHT: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "qh_fusion_effective_weight",
            "Weight applied to the quantum vector per fused sample"
        ).buckets(vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0])
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call twice.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Scheduler
        Box::new(SAMPLES_SUBMITTED.clone()),
        Box::new(BATCHES_COMPLETED.clone()),
        Box::new(WORKER_FAILURES.clone()),
        Box::new(SAMPLES_CANCELLED.clone()),
        Box::new(SAMPLES_REJECTED.clone()),
        Box::new(ACTIVE_WORKERS.clone()),
        Box::new(BATCH_DURATION.clone()),
        // Paths
        Box::new(CLASSICAL_FAILURES.clone()),
        Box::new(QUANTUM_DEGRADED.clone()),
        Box::new(QUANTUM_ATTEMPTS.clone()),
        // Fusion
        Box::new(SAMPLES_FUSED.clone()),
        Box::new(EFFECTIVE_WEIGHT.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Label value for a classical failure reason, `None` for non-classical ones.
pub fn classical_failure_label(reason: &FailureReason) -> Option<&'static str> {
    match reason {
        FailureReason::NumericDivergence => Some("numeric-divergence"),
        FailureReason::ModelError(_) => Some("model-error"),
        FailureReason::WorkerFailure(_)
        | FailureReason::Cancelled
        | FailureReason::InvalidInput(_) => None,
    }
}

/// Record one accepted submission.
pub fn record_submission(samples: usize) {
    SAMPLES_SUBMITTED.inc_by(samples as f64);
}

/// Record the pool gauge.
pub fn set_active_workers(active: usize) {
    ACTIVE_WORKERS.set(active as f64);
}

/// Record every counter and histogram a batch report feeds.
pub fn record_batch(report: &BatchReport) {
    let stats = &report.stats;

    BATCHES_COMPLETED.inc();
    SAMPLES_FUSED.inc_by(stats.fused as f64);
    QUANTUM_DEGRADED.inc_by(stats.quantum_degraded as f64);
    QUANTUM_ATTEMPTS.inc_by(stats.quantum_attempts as f64);
    WORKER_FAILURES.inc_by(stats.worker_failures as f64);
    SAMPLES_CANCELLED.inc_by(stats.cancelled as f64);
    SAMPLES_REJECTED.inc_by(stats.rejected as f64);
    BATCH_DURATION.observe(stats.elapsed_ms as f64 / 1000.0);

    for failure in report.failures() {
        if let Some(label) = classical_failure_label(&failure.reason) {
            CLASSICAL_FAILURES.with_label_values(&[label]).inc();
        }
    }

    for fused in report.fused() {
        EFFECTIVE_WEIGHT.observe(fused.provenance.effective_weight);
    }
}

/// Encode all metrics as Prometheus text format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
