//! Inbound Ports (Driving Ports / API)

use crate::domain::entities::{Batch, BatchReport, FusedResult, PathResult};
use crate::domain::errors::FusionError;
use crate::domain::value_objects::{Sample, SampleId};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Primary hybrid inference API
#[async_trait]
pub trait HybridInferenceApi: Send + Sync {
    /// Run a whole submission and return every batch report.
    ///
    /// 1. Validates the samples (non-empty, consistent dimensionality)
    /// 2. Partitions them into bounded batches
    /// 3. Dispatches batches across the worker pool
    /// 4. Returns reports ordered by batch id
    async fn infer(&self, samples: Vec<Sample>) -> Result<Vec<BatchReport>, FusionError>;

    /// Like `infer`, but reports are streamed as batches complete.
    async fn infer_stream(
        &self,
        samples: Vec<Sample>,
    ) -> Result<mpsc::Receiver<BatchReport>, FusionError>;

    /// Batch samples as they arrive on `samples`; a partial batch is flushed
    /// when the sender side closes.
    ///
    /// Each sample is validated on arrival. A malformed one is reported alone
    /// as `InvalidInput`. After shutdown, queued samples are reported cancelled.
    fn infer_channel(&self, samples: mpsc::Receiver<Sample>) -> mpsc::Receiver<BatchReport>;

    /// Run both paths for one batch and fuse the results.
    async fn process_batch(&self, batch: Batch) -> BatchReport;

    /// Fuse one sample's path results.
    fn fuse(
        &self,
        sample_id: SampleId,
        classical: &PathResult,
        quantum: &PathResult,
    ) -> Result<FusedResult, FusionError>;
}
