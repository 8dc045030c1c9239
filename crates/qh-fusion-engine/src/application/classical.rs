//! Classical Path Executor
//!
//! One model call per batch, no retries. A failure here is final for the
//! affected samples.

use crate::domain::entities::{Batch, FailureReason, PathResult};
use crate::ports::outbound::ClassicalModel;
use std::sync::Arc;
use tracing::warn;

pub struct ClassicalExecutor {
    model: Arc<dyn ClassicalModel>,
}

impl ClassicalExecutor {
    pub fn new(model: Arc<dyn ClassicalModel>) -> Self {
        Self { model }
    }

    pub fn output_dim(&self) -> usize {
        self.model.output_dim()
    }

    /// One result per sample, in batch order.
    pub async fn run(&self, batch: &Batch) -> Vec<PathResult> {
        let outputs = match self.model.infer(&batch.samples).await {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!(batch_id = %batch.id, error = %e, "Classical model failed for batch");
                return all_failed(batch.len(), FailureReason::ModelError(e.to_string()));
            }
        };

        if outputs.len() != batch.len() {
            warn!(
                batch_id = %batch.id,
                expected = batch.len(),
                actual = outputs.len(),
                "Classical model returned wrong number of outputs"
            );
            return all_failed(
                batch.len(),
                FailureReason::ModelError(format!(
                    "expected {} outputs, got {}",
                    batch.len(),
                    outputs.len()
                )),
            );
        }

        let width = self.model.output_dim();
        batch
            .samples
            .iter()
            .zip(outputs)
            .map(|(sample, vector)| {
                if vector.len() != width {
                    warn!(
                        sample_id = %sample.id(),
                        expected = width,
                        actual = vector.len(),
                        "Classical output has wrong width"
                    );
                    PathResult::failed(FailureReason::ModelError(format!(
                        "output width {}, expected {width}",
                        vector.len()
                    )))
                } else if vector.iter().all(|x| x.is_finite()) {
                    PathResult::success(vector, 0.0)
                } else {
                    warn!(sample_id = %sample.id(), "Classical output diverged");
                    PathResult::failed(FailureReason::NumericDivergence)
                }
            })
            .collect()
    }
}

fn all_failed(n: usize, reason: FailureReason) -> Vec<PathResult> {
    (0..n).map(|_| PathResult::failed(reason.clone())).collect()
}
