//! Batch partitioning

use crate::domain::entities::Batch;
use crate::domain::value_objects::{BatchId, Sample};

/// Split samples into consecutive batches of at most `batch_size`.
///
/// Submission order is preserved inside and across batches. Batch ids start
/// at `first_id` and increase by one.
pub fn partition(samples: Vec<Sample>, batch_size: usize, first_id: u64) -> Vec<Batch> {
    let size = batch_size.max(1);
    let mut batches = Vec::with_capacity(samples.len().div_ceil(size));
    let mut iter = samples.into_iter().peekable();
    let mut next_id = first_id;

    while iter.peek().is_some() {
        let chunk: Vec<Sample> = iter.by_ref().take(size).collect();
        batches.push(Batch::new(BatchId(next_id), chunk));
        next_id += 1;
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invariants::{invariant_batch_bound, invariant_exactly_once};
    use crate::domain::value_objects::{samples_from_vectors, SampleId};

    fn samples(n: usize) -> Vec<Sample> {
        samples_from_vectors((0..n).map(|i| vec![i as f64]).collect())
    }

    #[test]
    fn test_forty_samples_make_two_batches() {
        let batches = partition(samples(40), 32, 0);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 32);
        assert_eq!(batches[1].len(), 8);
        assert_eq!(batches[0].id, BatchId(0));
        assert_eq!(batches[1].id, BatchId(1));
    }

    #[test]
    fn test_exact_multiple() {
        let batches = partition(samples(64), 32, 5);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].id, BatchId(6));
    }

    #[test]
    fn test_empty_input() {
        assert!(partition(Vec::new(), 32, 0).is_empty());
    }

    #[test]
    fn test_order_preserved_and_each_sample_once() {
        let input = samples(10);
        let ids: Vec<SampleId> = input.iter().map(Sample::id).collect();
        let batches = partition(input, 3, 0);

        assert!(invariant_batch_bound(&batches, 3));
        assert!(invariant_exactly_once(&ids, &batches));

        let flat: Vec<SampleId> = batches.iter().flat_map(|b| b.sample_ids()).collect();
        assert_eq!(flat, ids);
    }
}
