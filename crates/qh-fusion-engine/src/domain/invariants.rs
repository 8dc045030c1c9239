//! Domain invariants for the fusion engine
//!
//! Pure predicates over batches and outcomes. The service asserts them in
//! debug builds; tests use them directly.

use super::entities::{Batch, PathResult, Provenance, SampleOutcome};
use super::value_objects::SampleId;
use std::collections::HashMap;

/// Batch bound: no batch exceeds `batch_size` samples and none is empty.
pub fn invariant_batch_bound(batches: &[Batch], batch_size: usize) -> bool {
    batches
        .iter()
        .all(|b| !b.is_empty() && b.len() <= batch_size)
}

/// Exactly-once: every submitted sample appears in exactly one batch.
pub fn invariant_exactly_once(submitted: &[SampleId], batches: &[Batch]) -> bool {
    let mut seen: HashMap<SampleId, usize> = HashMap::with_capacity(submitted.len());
    for batch in batches {
        for sample in &batch.samples {
            *seen.entry(sample.id()).or_default() += 1;
        }
    }

    seen.len() == submitted.len() && submitted.iter().all(|id| seen.get(id) == Some(&1))
}

/// Retry bound: at most `max_retries + 1` attempts per sample.
pub fn invariant_retry_bound(result: &PathResult, max_retries: u32) -> bool {
    result.attempts >= 1 && result.attempts <= max_retries + 1
}

/// Coverage: a fused result exists if and only if the classical path succeeded.
pub fn invariant_coverage(classical: &[PathResult], outcomes: &[SampleOutcome]) -> bool {
    classical.len() == outcomes.len()
        && classical
            .iter()
            .zip(outcomes)
            .all(|(c, o)| c.is_success() == o.is_ok())
}

/// Degradation: a degraded quantum result contributes nothing.
pub fn invariant_degraded_weight_zero(provenance: &Provenance) -> bool {
    !provenance.quantum_degraded || provenance.effective_weight == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{FailureReason, FusedResult, SampleFailure};
    use crate::domain::value_objects::{BatchId, Sample};

    fn batch(id: u64, ids: &[u64]) -> Batch {
        Batch::new(
            BatchId(id),
            ids.iter()
                .map(|&i| Sample::new(SampleId(i), vec![0.0]))
                .collect(),
        )
    }

    #[test]
    fn test_batch_bound() {
        let batches = vec![batch(0, &[0, 1, 2]), batch(1, &[3])];
        assert!(invariant_batch_bound(&batches, 3));
        assert!(!invariant_batch_bound(&batches, 2));
        assert!(!invariant_batch_bound(&[batch(0, &[])], 3));
    }

    #[test]
    fn test_exactly_once_detects_duplicates_and_gaps() {
        let submitted: Vec<_> = (0..4).map(SampleId).collect();
        assert!(invariant_exactly_once(
            &submitted,
            &[batch(0, &[0, 1]), batch(1, &[2, 3])]
        ));
        assert!(!invariant_exactly_once(
            &submitted,
            &[batch(0, &[0, 1]), batch(1, &[1, 2, 3])]
        ));
        assert!(!invariant_exactly_once(&submitted, &[batch(0, &[0, 1, 2])]));
    }

    #[test]
    fn test_retry_bound() {
        let ok = PathResult::degraded(2, 4);
        assert!(invariant_retry_bound(&ok, 3));
        assert!(!invariant_retry_bound(&ok, 2));
    }

    #[test]
    fn test_coverage() {
        let classical = vec![
            PathResult::success(vec![1.0], 0.0),
            PathResult::failed(FailureReason::NumericDivergence),
        ];
        let provenance = Provenance {
            quantum_degraded: false,
            effective_weight: 0.5,
            attention_score: None,
            quantum_error_estimate: 0.0,
            quantum_attempts: 1,
        };
        let good = vec![
            Ok(FusedResult {
                sample_id: SampleId(0),
                vector: vec![1.0],
                provenance,
            }),
            Err(SampleFailure {
                sample_id: SampleId(1),
                reason: FailureReason::NumericDivergence,
            }),
        ];
        assert!(invariant_coverage(&classical, &good));
        assert!(!invariant_coverage(&classical, &good[..1]));
    }
}
