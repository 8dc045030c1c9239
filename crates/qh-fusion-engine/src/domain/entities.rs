//! Core domain entities for the fusion engine

use super::value_objects::{BatchId, Sample, SampleId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error estimate attached to a degraded quantum result (maximum uncertainty).
pub const DEGRADED_ERROR_ESTIMATE: f64 = 1.0;

/// Ordered group of samples processed together by one worker.
#[derive(Clone, Debug)]
pub struct Batch {
    pub id: BatchId,
    pub samples: Vec<Sample>,
}

impl Batch {
    pub fn new(id: BatchId, samples: Vec<Sample>) -> Self {
        Self { id, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_ids(&self) -> Vec<SampleId> {
        self.samples.iter().map(Sample::id).collect()
    }
}

/// Why a sample produced no fused result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum FailureReason {
    /// Classical model emitted NaN or infinity for this sample
    NumericDivergence,
    /// Classical model call failed for the whole batch
    ModelError(String),
    /// The worker running the batch crashed
    WorkerFailure(String),
    /// Processing was cancelled before the sample completed
    Cancelled,
    /// Sample was malformed and never entered a batch
    InvalidInput(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NumericDivergence => write!(f, "numeric-divergence"),
            FailureReason::ModelError(msg) => write!(f, "model-error: {msg}"),
            FailureReason::WorkerFailure(msg) => write!(f, "worker-failure: {msg}"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::InvalidInput(msg) => write!(f, "invalid-input: {msg}"),
        }
    }
}

/// Status of one path's output for one sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathStatus {
    Success,
    Failed(FailureReason),
    /// Quantum only: retries exhausted, neutral fallback in place
    Degraded,
}

/// Output of a single computation path for a single sample.
#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    pub vector: Vec<f64>,
    pub status: PathStatus,
    /// 0.0 = certain, 1.0 = no information
    pub error_estimate: f64,
    pub attempts: u32,
}

impl PathResult {
    pub fn success(vector: Vec<f64>, error_estimate: f64) -> Self {
        Self {
            vector,
            status: PathStatus::Success,
            error_estimate,
            attempts: 1,
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Self {
            vector: Vec::new(),
            status: PathStatus::Failed(reason),
            error_estimate: DEGRADED_ERROR_ESTIMATE,
            attempts: 1,
        }
    }

    /// Zero vector of `dim` components with maximum uncertainty.
    pub fn degraded(dim: usize, attempts: u32) -> Self {
        Self {
            vector: vec![0.0; dim],
            status: PathStatus::Degraded,
            error_estimate: DEGRADED_ERROR_ESTIMATE,
            attempts,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == PathStatus::Success
    }

    pub fn is_degraded(&self) -> bool {
        self.status == PathStatus::Degraded
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match &self.status {
            PathStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// How a fused vector came to be.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub quantum_degraded: bool,
    /// Weight actually applied to the quantum vector
    pub effective_weight: f64,
    /// Sigmoid alignment score, attention mode only
    pub attention_score: Option<f64>,
    pub quantum_error_estimate: f64,
    pub quantum_attempts: u32,
}

/// Final per-sample output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub sample_id: SampleId,
    pub vector: Vec<f64>,
    pub provenance: Provenance,
}

/// Failed slot in a batch report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleFailure {
    pub sample_id: SampleId,
    pub reason: FailureReason,
}

impl fmt::Display for SampleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sample {} failed: {}", self.sample_id, self.reason)
    }
}

/// Per-sample status: a fused result or the reason there is none.
pub type SampleOutcome = Result<FusedResult, SampleFailure>;

/// Counters for one processed batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub samples: usize,
    pub fused: usize,
    pub classical_failures: usize,
    pub quantum_degraded: usize,
    pub quantum_attempts: u64,
    pub worker_failures: usize,
    pub cancelled: usize,
    pub rejected: usize,
    pub elapsed_ms: u64,
}

impl BatchStats {
    /// Tally outcomes plus the quantum path results that fed them.
    pub fn tally(outcomes: &[SampleOutcome], quantum: &[PathResult], elapsed_ms: u64) -> Self {
        let mut stats = BatchStats {
            samples: outcomes.len(),
            elapsed_ms,
            ..Default::default()
        };

        for outcome in outcomes {
            match outcome {
                Ok(_) => stats.fused += 1,
                Err(failure) => match failure.reason {
                    FailureReason::NumericDivergence | FailureReason::ModelError(_) => {
                        stats.classical_failures += 1
                    }
                    FailureReason::WorkerFailure(_) => stats.worker_failures += 1,
                    FailureReason::Cancelled => stats.cancelled += 1,
                    FailureReason::InvalidInput(_) => stats.rejected += 1,
                },
            }
        }

        for result in quantum {
            stats.quantum_attempts += u64::from(result.attempts);
            if result.is_degraded() {
                stats.quantum_degraded += 1;
            }
        }

        stats
    }
}

/// Result of processing one batch, outcomes in input order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub outcomes: Vec<SampleOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    /// Report in which every sample failed for the same reason.
    pub fn all_failed(batch_id: BatchId, sample_ids: &[SampleId], reason: FailureReason) -> Self {
        let outcomes: Vec<SampleOutcome> = sample_ids
            .iter()
            .map(|&sample_id| {
                Err(SampleFailure {
                    sample_id,
                    reason: reason.clone(),
                })
            })
            .collect();
        let stats = BatchStats::tally(&outcomes, &[], 0);
        Self {
            batch_id,
            outcomes,
            stats,
        }
    }

    pub fn fused(&self) -> impl Iterator<Item = &FusedResult> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SampleFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }
}
