//! Fusion Engine
//!
//! Merges one sample's classical and quantum path results. The classical
//! result is mandatory; the quantum result may be degraded, in which case its
//! error estimate is folded into the weight.

use crate::algorithms::fusion::{effective_weight, fuse_vectors};
use crate::config::FusionConfig;
use crate::domain::entities::{
    FailureReason, FusedResult, PathResult, PathStatus, Provenance, DEGRADED_ERROR_ESTIMATE,
};
use crate::domain::errors::FusionError;
use crate::domain::value_objects::{FusionMode, SampleId};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FusionEngine {
    mode: FusionMode,
    quantum_weight: f64,
}

impl FusionEngine {
    pub fn new(mode: FusionMode, quantum_weight: f64) -> Self {
        Self {
            mode,
            quantum_weight,
        }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(config.fusion_mode, config.quantum_weight)
    }

    pub fn mode(&self) -> FusionMode {
        self.mode
    }

    pub fn quantum_weight(&self) -> f64 {
        self.quantum_weight
    }

    /// Fuse one sample.
    ///
    /// A failed quantum result is treated like a degraded one: it may never
    /// block a sample whose classical path succeeded.
    pub fn fuse(
        &self,
        sample_id: SampleId,
        classical: &PathResult,
        quantum: &PathResult,
    ) -> Result<FusedResult, FusionError> {
        match &classical.status {
            PathStatus::Success => {}
            PathStatus::Failed(reason) => {
                return Err(FusionError::ClassicalFailure {
                    sample_id,
                    reason: reason.clone(),
                })
            }
            PathStatus::Degraded => {
                return Err(FusionError::ClassicalFailure {
                    sample_id,
                    reason: FailureReason::ModelError("classical result degraded".into()),
                })
            }
        }

        let degraded = !quantum.is_success();
        let error_estimate = match quantum.status {
            PathStatus::Failed(_) => DEGRADED_ERROR_ESTIMATE,
            _ => quantum.error_estimate,
        };
        let w_eff = effective_weight(self.quantum_weight, degraded, error_estimate);
        let fused = fuse_vectors(self.mode, w_eff, &classical.vector, &quantum.vector);

        Ok(FusedResult {
            sample_id,
            vector: fused.vector,
            provenance: Provenance {
                quantum_degraded: degraded,
                effective_weight: fused.applied_weight,
                attention_score: fused.attention_score,
                quantum_error_estimate: error_estimate,
                quantum_attempts: quantum.attempts,
            },
        })
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::from_config(&FusionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invariants::invariant_degraded_weight_zero;

    fn ok(v: Vec<f64>) -> PathResult {
        PathResult::success(v, 0.0)
    }

    #[test]
    fn test_weighted_sum_midpoint() {
        let engine = FusionEngine::new(FusionMode::WeightedSum, 0.5);
        let fused = engine
            .fuse(SampleId(0), &ok(vec![1.0, 0.0]), &ok(vec![0.0, 1.0]))
            .unwrap();
        assert_eq!(fused.vector, vec![0.5, 0.5]);
        assert!(!fused.provenance.quantum_degraded);
        assert_eq!(fused.provenance.effective_weight, 0.5);
        assert_eq!(fused.provenance.attention_score, None);
    }

    #[test]
    fn test_degraded_quantum_returns_classical() {
        for mode in [FusionMode::WeightedSum, FusionMode::Attention] {
            let engine = FusionEngine::new(mode, 0.5);
            let fused = engine
                .fuse(SampleId(0), &ok(vec![1.0, 0.0]), &PathResult::degraded(2, 4))
                .unwrap();
            assert_eq!(fused.vector, vec![1.0, 0.0]);
            assert!(fused.provenance.quantum_degraded);
            assert_eq!(fused.provenance.effective_weight, 0.0);
            assert_eq!(fused.provenance.quantum_attempts, 4);
            assert!(invariant_degraded_weight_zero(&fused.provenance));
        }
    }

    #[test]
    fn test_failed_quantum_counts_as_degraded() {
        let engine = FusionEngine::new(FusionMode::WeightedSum, 1.0);
        let quantum = PathResult::failed(FailureReason::Cancelled);
        let fused = engine
            .fuse(SampleId(3), &ok(vec![0.25, 0.75]), &quantum)
            .unwrap();
        assert_eq!(fused.vector, vec![0.25, 0.75]);
        assert!(fused.provenance.quantum_degraded);
    }

    #[test]
    fn test_concat_degraded_appends_zeros() {
        let engine = FusionEngine::new(FusionMode::Concat, 0.5);
        let fused = engine
            .fuse(SampleId(0), &ok(vec![1.0, 2.0]), &PathResult::degraded(4, 4))
            .unwrap();
        assert_eq!(fused.vector, vec![1.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_attention_records_score() {
        let engine = FusionEngine::new(FusionMode::Attention, 1.0);
        let fused = engine
            .fuse(SampleId(0), &ok(vec![1.0, 0.0]), &ok(vec![0.0, 1.0]))
            .unwrap();
        // Orthogonal vectors: a = sigmoid(0) = 0.5
        assert_eq!(fused.provenance.attention_score, Some(0.5));
        assert_eq!(fused.provenance.effective_weight, 0.5);
        assert_eq!(fused.vector, vec![0.5, 0.5]);
    }

    #[test]
    fn test_classical_failure_produces_nothing() {
        let engine = FusionEngine::default();
        let classical = PathResult::failed(FailureReason::NumericDivergence);
        let err = engine
            .fuse(SampleId(9), &classical, &ok(vec![0.0, 1.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            FusionError::ClassicalFailure {
                sample_id: SampleId(9),
                reason: FailureReason::NumericDivergence
            }
        ));
    }

    #[test]
    fn test_mismatched_dims_are_padded() {
        let engine = FusionEngine::new(FusionMode::WeightedSum, 0.5);
        let fused = engine
            .fuse(SampleId(0), &ok(vec![1.0]), &ok(vec![0.0, 1.0, 1.0]))
            .unwrap();
        assert_eq!(fused.vector, vec![0.5, 0.5, 0.5]);
    }
}
