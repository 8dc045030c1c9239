//! Error types for the fusion engine

use super::entities::FailureReason;
use super::value_objects::{BatchId, SampleId};
use crate::config::ConfigError;
use thiserror::Error;

/// All errors surfaced by the fusion engine
#[derive(Debug, Error)]
pub enum FusionError {
    /// Classical path failed; no fused result exists for the sample
    #[error("Classical failure for sample {sample_id}: {reason}")]
    ClassicalFailure {
        sample_id: SampleId,
        reason: FailureReason,
    },

    /// Quantum path exhausted its retry budget (non-fatal)
    #[error("Quantum path degraded for sample {sample_id} after {attempts} attempts")]
    QuantumDegraded { sample_id: SampleId, attempts: u32 },

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Worker crashed while processing a batch
    #[error("Worker failure on batch {batch_id}: {reason}")]
    WorkerFailure { batch_id: BatchId, reason: String },

    /// Submission rejected before dispatch
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Sample dimensionality differs from the rest of the submission
    #[error("Dimension mismatch for sample {sample_id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        sample_id: SampleId,
        expected: usize,
        actual: usize,
    },

    /// Processing was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

impl FusionError {
    /// True for errors that only affect a single sample.
    pub fn is_per_sample(&self) -> bool {
        matches!(
            self,
            FusionError::ClassicalFailure { .. } | FusionError::QuantumDegraded { .. }
        )
    }
}

/// Classical model error
#[derive(Debug, Error)]
pub enum ClassicalError {
    #[error("Input dimension mismatch: expected {expected}, got {actual}")]
    InputDimension { expected: usize, actual: usize },

    #[error("Model inference failed: {0}")]
    Inference(String),
}

/// Quantum simulation error
#[derive(Debug, Error)]
pub enum QuantumError {
    #[error("Simulation timed out")]
    Timeout,

    #[error("Numeric instability in simulation: {0}")]
    NumericInstability(String),

    #[error("Simulation backend failed: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FusionError::ClassicalFailure {
            sample_id: SampleId(4),
            reason: FailureReason::NumericDivergence,
        };
        assert_eq!(
            err.to_string(),
            "Classical failure for sample s4: numeric-divergence"
        );
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let err = FusionError::DimensionMismatch {
            sample_id: SampleId(2),
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch for sample s2: expected 4, got 3"
        );
    }

    #[test]
    fn test_per_sample_classification() {
        assert!(FusionError::QuantumDegraded {
            sample_id: SampleId(0),
            attempts: 4
        }
        .is_per_sample());
        assert!(!FusionError::Cancelled.is_per_sample());
        assert!(!FusionError::WorkerFailure {
            batch_id: BatchId(1),
            reason: "panic".into()
        }
        .is_per_sample());
    }
}
