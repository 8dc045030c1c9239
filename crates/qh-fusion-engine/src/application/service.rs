//! Hybrid Fusion Service
//!
//! Wires the executors, the resilience controller, the fusion engine and the
//! scheduler behind `HybridInferenceApi`.

use super::classical::ClassicalExecutor;
use super::fusion_engine::FusionEngine;
use super::resilience::ResilienceController;
use super::scheduler::{BatchHandler, BatchScheduler};
use super::shutdown::is_cancelled;
use crate::adapters::{DenseNetwork, StateVectorSimulator};
use crate::config::FusionConfig;
use crate::domain::entities::{
    Batch, BatchReport, BatchStats, FailureReason, FusedResult, PathResult, SampleFailure,
    SampleOutcome,
};
use crate::domain::errors::FusionError;
use crate::domain::invariants::{invariant_coverage, invariant_degraded_weight_zero};
use crate::domain::value_objects::{Sample, SampleId};
use crate::ports::inbound::HybridInferenceApi;
use crate::ports::outbound::{ClassicalModel, QuantumSimulator};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};

/// Per-batch processing: dual-path execution, join, fuse.
pub struct FusionPipeline {
    classical: ClassicalExecutor,
    resilience: ResilienceController,
    engine: FusionEngine,
    shutdown: watch::Receiver<bool>,
}

impl FusionPipeline {
    pub fn new(
        classical: ClassicalExecutor,
        resilience: ResilienceController,
        engine: FusionEngine,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            classical,
            resilience,
            engine,
            shutdown,
        }
    }

    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    async fn run_batch(&self, batch: Batch) -> BatchReport {
        let started = Instant::now();

        let quantum_futures = batch.samples.iter().map(|s| self.resilience.execute(s));
        let (classical, quantum) =
            tokio::join!(self.classical.run(&batch), join_all(quantum_futures));

        if is_cancelled(&self.shutdown) || quantum.iter().any(Result::is_err) {
            info!(samples = batch.len(), "Batch cancelled, classical results discarded");
            let mut report =
                BatchReport::all_failed(batch.id, &batch.sample_ids(), FailureReason::Cancelled);
            report.stats.elapsed_ms = elapsed_ms(started);
            return report;
        }

        let quantum: Vec<PathResult> = quantum
            .into_iter()
            .map(|r| r.unwrap_or_else(|_| PathResult::failed(FailureReason::Cancelled)))
            .collect();

        let outcomes: Vec<SampleOutcome> = batch
            .samples
            .iter()
            .zip(classical.iter().zip(&quantum))
            .map(|(sample, (c, q))| self.fuse_one(sample.id(), c, q))
            .collect();

        debug_assert!(invariant_coverage(&classical, &outcomes));
        debug_assert!(outcomes
            .iter()
            .flatten()
            .all(|r| invariant_degraded_weight_zero(&r.provenance)));

        let stats = BatchStats::tally(&outcomes, &quantum, elapsed_ms(started));
        info!(
            fused = stats.fused,
            classical_failures = stats.classical_failures,
            quantum_degraded = stats.quantum_degraded,
            quantum_attempts = stats.quantum_attempts,
            elapsed_ms = stats.elapsed_ms,
            "Batch complete"
        );

        BatchReport {
            batch_id: batch.id,
            outcomes,
            stats,
        }
    }

    fn fuse_one(
        &self,
        sample_id: SampleId,
        classical: &PathResult,
        quantum: &PathResult,
    ) -> SampleOutcome {
        self.engine.fuse(sample_id, classical, quantum).map_err(|e| {
            let reason = match e {
                FusionError::ClassicalFailure { reason, .. } => reason,
                other => FailureReason::ModelError(other.to_string()),
            };
            debug!(%sample_id, %reason, "No fused result for sample");
            SampleFailure { sample_id, reason }
        })
    }
}

#[async_trait]
impl BatchHandler for FusionPipeline {
    async fn handle(&self, batch: Batch) -> BatchReport {
        let span = info_span!("batch", batch_id = %batch.id, samples = batch.len());
        self.run_batch(batch).instrument(span).await
    }
}

/// Hybrid quantum/classical inference service
pub struct HybridFusionService {
    config: Arc<FusionConfig>,
    pipeline: Arc<FusionPipeline>,
    scheduler: BatchScheduler,
    /// Required sample width; `None` accepts the first sample's width
    expected_dim: Option<usize>,
    shutdown_tx: watch::Sender<bool>,
}

impl HybridFusionService {
    /// Validate `config` and wire the given collaborators.
    pub fn new(
        config: FusionConfig,
        classical: Arc<dyn ClassicalModel>,
        quantum: Arc<dyn QuantumSimulator>,
    ) -> Result<Self, FusionError> {
        config.validate()?;

        let config = Arc::new(config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pipeline = FusionPipeline::new(
            ClassicalExecutor::new(classical),
            ResilienceController::new(quantum, &config, shutdown_rx.clone()),
            FusionEngine::from_config(&config),
            shutdown_rx.clone(),
        );
        let scheduler = BatchScheduler::from_config(&config, shutdown_rx);

        info!(
            fusion_mode = %config.fusion_mode,
            quantum_weight = config.quantum_weight,
            max_workers = config.max_workers,
            batch_size = config.batch_size,
            max_retries = config.max_retries,
            timeout_secs = config.timeout_secs,
            "Hybrid fusion service initialized"
        );

        Ok(Self {
            expected_dim: config.input_dim,
            config,
            pipeline: Arc::new(pipeline),
            scheduler,
            shutdown_tx,
        })
    }

    /// Service backed by the reference state-vector simulator and dense network.
    pub fn with_reference_models(config: FusionConfig) -> Result<Self, FusionError> {
        config.validate()?;

        let input_dim = config.input_dim.unwrap_or(config.n_qubits);
        let classical = Arc::new(DenseNetwork::new(
            input_dim,
            config.hidden_size,
            config.output_size,
            config.seed,
        ));
        let quantum = Arc::new(StateVectorSimulator::new(
            config.n_qubits,
            config.quantum_depth,
            config.seed,
        ));

        let mut service = Self::new(config, classical, quantum)?;
        service.expected_dim = Some(input_dim);
        Ok(service)
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Signal shutdown: in-flight quantum attempts are abandoned and batches
    /// not yet dispatched are reported cancelled.
    pub fn shutdown(&self) {
        if !self.shutdown_tx.send_replace(true) {
            warn!("Shutdown requested, cancelling in-flight work");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Reject a submission before anything is dispatched.
    pub fn validate_samples(&self, samples: &[Sample]) -> Result<(), FusionError> {
        let first = samples
            .first()
            .ok_or_else(|| FusionError::InvalidInput("empty submission".into()))?;
        let expected = self.expected_dim.unwrap_or(first.dim());

        let mut seen = HashSet::with_capacity(samples.len());
        for sample in samples {
            check_sample(sample, expected, &mut seen)?;
        }

        Ok(())
    }

    /// Per-sample screen for channel input. The width is fixed by the first
    /// accepted sample when the service has none configured.
    fn channel_screen(&self) -> impl FnMut(&Sample) -> Result<(), String> + Send + 'static {
        let mut expected = self.expected_dim;
        let mut seen = HashSet::new();
        move |sample: &Sample| {
            let dim = expected.unwrap_or(sample.dim());
            check_sample(sample, dim, &mut seen).map_err(|e| e.to_string())?;
            expected = Some(dim);
            Ok(())
        }
    }

    fn accept(&self, samples: &[Sample]) -> Result<(), FusionError> {
        if self.is_shutdown() {
            return Err(FusionError::Cancelled);
        }
        self.validate_samples(samples)?;
        info!(samples = samples.len(), "Submission accepted");
        Ok(())
    }
}

#[async_trait]
impl HybridInferenceApi for HybridFusionService {
    async fn infer(&self, samples: Vec<Sample>) -> Result<Vec<BatchReport>, FusionError> {
        self.accept(&samples)?;
        Ok(self.scheduler.run(samples, self.pipeline.clone()).await)
    }

    async fn infer_stream(
        &self,
        samples: Vec<Sample>,
    ) -> Result<mpsc::Receiver<BatchReport>, FusionError> {
        self.accept(&samples)?;
        let batches = self.scheduler.partition(samples);
        Ok(self.scheduler.dispatch(batches, self.pipeline.clone()))
    }

    fn infer_channel(&self, samples: mpsc::Receiver<Sample>) -> mpsc::Receiver<BatchReport> {
        if self.is_shutdown() {
            warn!("Channel submission after shutdown, queued samples will be cancelled");
        }
        self.scheduler
            .dispatch_channel(samples, self.pipeline.clone(), self.channel_screen())
    }

    async fn process_batch(&self, batch: Batch) -> BatchReport {
        self.pipeline.handle(batch).await
    }

    fn fuse(
        &self,
        sample_id: SampleId,
        classical: &PathResult,
        quantum: &PathResult,
    ) -> Result<FusedResult, FusionError> {
        self.pipeline.engine().fuse(sample_id, classical, quantum)
    }
}

fn check_sample(
    sample: &Sample,
    expected: usize,
    seen: &mut HashSet<SampleId>,
) -> Result<(), FusionError> {
    if expected == 0 {
        return Err(FusionError::InvalidInput(
            "samples must have at least one feature".into(),
        ));
    }
    if sample.dim() != expected {
        return Err(FusionError::DimensionMismatch {
            sample_id: sample.id(),
            expected,
            actual: sample.dim(),
        });
    }
    if !sample.is_finite() {
        return Err(FusionError::InvalidInput(format!(
            "sample {} has non-finite features",
            sample.id()
        )));
    }
    if !seen.insert(sample.id()) {
        return Err(FusionError::InvalidInput(format!(
            "duplicate sample id {}",
            sample.id()
        )));
    }
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
