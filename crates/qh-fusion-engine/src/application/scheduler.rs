//! Batch Scheduler
//!
//! Partitions submissions into bounded batches and runs them on a worker
//! pool of at most `max_workers` tasks.
//!
//! ```text
//! samples ─→ partition ─→ [b0][b1][b2]…
//!                           │
//!            driver: acquire permit (in order) ─→ spawn worker ─→ handler.handle(batch)
//!                           │                                          │
//!              shutdown ─→ remaining batches reported Cancelled        ↓
//!                                                   release permit, send BatchReport
//! ```
//!
//! A worker panic is caught at the task boundary and turned into a
//! `WorkerFailure` report for that batch. Batches are never resubmitted.
//!
//! Channel input is screened sample by sample; a rejected sample gets a
//! single-slot `InvalidInput` report and never joins a batch.

use super::shutdown::cancelled;
use crate::algorithms::batching::partition;
use crate::config::FusionConfig;
use crate::domain::entities::{Batch, BatchReport, FailureReason};
use crate::domain::value_objects::{BatchId, Sample};
use async_trait::async_trait;
use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Processes one batch end to end.
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    async fn handle(&self, batch: Batch) -> BatchReport;
}

/// Bounded worker pool over batches
#[derive(Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    max_workers: usize,
    permits: Arc<Semaphore>,
    next_batch_id: Arc<AtomicU64>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    shutdown: watch::Receiver<bool>,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, max_workers: usize, shutdown: watch::Receiver<bool>) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            batch_size: batch_size.max(1),
            max_workers,
            permits: Arc::new(Semaphore::new(max_workers)),
            next_batch_id: Arc::new(AtomicU64::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            shutdown,
        }
    }

    pub fn from_config(config: &FusionConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self::new(config.batch_size, config.max_workers, shutdown)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Batches currently being processed.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest concurrent batch count observed since creation.
    pub fn peak_workers(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Split `samples` into batches with fresh, increasing ids.
    pub fn partition(&self, samples: Vec<Sample>) -> Vec<Batch> {
        let count = samples.len().div_ceil(self.batch_size) as u64;
        let first_id = self.next_batch_id.fetch_add(count, Ordering::SeqCst);
        partition(samples, self.batch_size, first_id)
    }

    /// Dispatch `batches` in order; reports arrive as batches complete.
    pub fn dispatch<H: BatchHandler>(
        &self,
        batches: Vec<Batch>,
        handler: Arc<H>,
    ) -> mpsc::Receiver<BatchReport> {
        let (tx, rx) = mpsc::channel(batches.len().max(1));
        let scheduler = self.clone();

        tokio::spawn(async move {
            let total = batches.len();
            let mut pending = batches.into_iter();
            let mut dispatched = 0usize;

            while let Some(batch) = pending.next() {
                match scheduler.acquire().await {
                    Some(permit) => {
                        scheduler.spawn_worker(batch, permit, handler.clone(), tx.clone());
                        dispatched += 1;
                    }
                    None => {
                        report_cancelled(std::iter::once(batch).chain(pending.by_ref()), &tx)
                            .await;
                        break;
                    }
                }
            }

            debug!(total, dispatched, "Batch dispatch finished");
        });

        rx
    }

    /// Batch samples as they arrive; a partial batch is flushed when the
    /// input channel closes.
    ///
    /// `screen` sees every sample before it is buffered. On shutdown the
    /// input is closed and everything still queued is reported cancelled.
    pub fn dispatch_channel<H, V>(
        &self,
        mut samples: mpsc::Receiver<Sample>,
        handler: Arc<H>,
        mut screen: V,
    ) -> mpsc::Receiver<BatchReport>
    where
        H: BatchHandler,
        V: FnMut(&Sample) -> Result<(), String> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.max_workers * 2);
        let scheduler = self.clone();

        tokio::spawn(async move {
            let mut shutdown = scheduler.shutdown.clone();
            let mut buffer: Vec<Sample> = Vec::with_capacity(scheduler.batch_size);

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancelled(&mut shutdown) => {
                        samples.close();
                        while let Some(sample) = samples.recv().await {
                            buffer.push(sample);
                        }
                        let batches = scheduler.partition(std::mem::take(&mut buffer));
                        report_cancelled(batches, &tx).await;
                        return;
                    }
                    next = samples.recv() => next,
                };

                match next {
                    Some(sample) => match screen(&sample) {
                        Ok(()) => {
                            buffer.push(sample);
                            if buffer.len() >= scheduler.batch_size {
                                scheduler.flush(&mut buffer, &handler, &tx).await;
                            }
                        }
                        Err(reason) => scheduler.reject(&sample, reason, &tx).await,
                    },
                    None => {
                        scheduler.flush(&mut buffer, &handler, &tx).await;
                        return;
                    }
                }
            }
        });

        rx
    }

    /// Run every sample and collect the reports, sorted by batch id.
    pub async fn run<H: BatchHandler>(
        &self,
        samples: Vec<Sample>,
        handler: Arc<H>,
    ) -> Vec<BatchReport> {
        let mut rx = self.dispatch(self.partition(samples), handler);
        let mut reports = Vec::new();
        while let Some(report) = rx.recv().await {
            reports.push(report);
        }
        reports.sort_by_key(|r| r.batch_id);
        reports
    }

    async fn flush<H: BatchHandler>(
        &self,
        buffer: &mut Vec<Sample>,
        handler: &Arc<H>,
        tx: &mpsc::Sender<BatchReport>,
    ) {
        if buffer.is_empty() {
            return;
        }
        for batch in self.partition(std::mem::take(buffer)) {
            match self.acquire().await {
                Some(permit) => self.spawn_worker(batch, permit, handler.clone(), tx.clone()),
                None => report_cancelled(std::iter::once(batch), tx).await,
            }
        }
    }

    async fn reject(&self, sample: &Sample, reason: String, tx: &mpsc::Sender<BatchReport>) {
        let batch_id = BatchId(self.next_batch_id.fetch_add(1, Ordering::SeqCst));
        warn!(%batch_id, sample_id = %sample.id(), %reason, "Sample rejected");
        let report = BatchReport::all_failed(
            batch_id,
            &[sample.id()],
            FailureReason::InvalidInput(reason),
        );
        if tx.send(report).await.is_err() {
            debug!(%batch_id, "Report receiver dropped");
        }
    }

    /// Wait for a worker slot; `None` once shutdown is signalled.
    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            biased;
            _ = cancelled(&mut shutdown) => None,
            permit = self.permits.clone().acquire_owned() => permit.ok(),
        }
    }

    fn spawn_worker<H: BatchHandler>(
        &self,
        batch: Batch,
        permit: OwnedSemaphorePermit,
        handler: Arc<H>,
        tx: mpsc::Sender<BatchReport>,
    ) {
        let active = self.active.clone();
        let peak = self.peak.clone();

        tokio::spawn(async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);

            let batch_id = batch.id;
            let sample_ids = batch.sample_ids();
            let report = match tokio::spawn(async move { handler.handle(batch).await }).await {
                Ok(report) => report,
                Err(e) => {
                    let reason = join_error_reason(e);
                    warn!(%batch_id, samples = sample_ids.len(), %reason, "Worker failed, batch dropped");
                    BatchReport::all_failed(batch_id, &sample_ids, FailureReason::WorkerFailure(reason))
                }
            };

            active.fetch_sub(1, Ordering::SeqCst);
            drop(permit);

            if tx.send(report).await.is_err() {
                debug!(%batch_id, "Report receiver dropped");
            }
        });
    }
}

async fn report_cancelled<I>(batches: I, tx: &mpsc::Sender<BatchReport>)
where
    I: IntoIterator<Item = Batch>,
{
    for batch in batches {
        info!(batch_id = %batch.id, samples = batch.len(), "Batch cancelled before dispatch");
        let report =
            BatchReport::all_failed(batch.id, &batch.sample_ids(), FailureReason::Cancelled);
        if tx.send(report).await.is_err() {
            return;
        }
    }
}

fn join_error_reason(error: JoinError) -> String {
    if error.is_panic() {
        panic_message(error.into_panic())
    } else {
        "worker task cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::BatchStats;
    use crate::domain::invariants::{invariant_batch_bound, invariant_exactly_once};
    use crate::domain::value_objects::{samples_from_vectors, SampleId};
    use std::time::Duration;

    /// Reports every sample as fused-free, sleeping to hold the worker
    struct SlowHandler {
        delay: Duration,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowHandler {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BatchHandler for SlowHandler {
        async fn handle(&self, batch: Batch) -> BatchReport {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            BatchReport {
                batch_id: batch.id,
                outcomes: Vec::new(),
                stats: BatchStats {
                    samples: batch.len(),
                    ..Default::default()
                },
            }
        }
    }

    struct PanickingHandler {
        poisoned: BatchId,
    }

    #[async_trait]
    impl BatchHandler for PanickingHandler {
        async fn handle(&self, batch: Batch) -> BatchReport {
            if batch.id == self.poisoned {
                panic!("poisoned batch");
            }
            BatchReport {
                batch_id: batch.id,
                outcomes: Vec::new(),
                stats: BatchStats::default(),
            }
        }
    }

    fn samples(n: usize) -> Vec<Sample> {
        samples_from_vectors((0..n).map(|i| vec![i as f64]).collect())
    }

    #[test]
    fn test_partition_assigns_increasing_ids() {
        let (_tx, rx) = watch::channel(false);
        let scheduler = BatchScheduler::new(32, 4, rx);
        let input = samples(40);
        let ids: Vec<_> = input.iter().map(Sample::id).collect();

        let first = scheduler.partition(input);
        assert_eq!(first.len(), 2);
        assert!(invariant_batch_bound(&first, 32));
        assert!(invariant_exactly_once(&ids, &first));

        let second = scheduler.partition(samples(5));
        assert_eq!(second[0].id, BatchId(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_max_workers() {
        let (_tx, rx) = watch::channel(false);
        let scheduler = BatchScheduler::new(2, 3, rx);
        let handler = Arc::new(SlowHandler::new(Duration::from_millis(50)));

        let reports = scheduler.run(samples(20), handler.clone()).await;

        assert_eq!(reports.len(), 10);
        assert!(handler.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(scheduler.peak_workers(), 3);
        assert_eq!(scheduler.active_workers(), 0);
        let ids: Vec<_> = reports.iter().map(|r| r.batch_id.0).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panic_becomes_worker_failure() {
        let (_tx, rx) = watch::channel(false);
        let scheduler = BatchScheduler::new(2, 2, rx);
        let handler = Arc::new(PanickingHandler {
            poisoned: BatchId(1),
        });

        let reports = scheduler.run(samples(6), handler).await;

        assert_eq!(reports.len(), 3);
        let failed = &reports[1];
        assert_eq!(failed.batch_id, BatchId(1));
        assert_eq!(failed.outcomes.len(), 2);
        assert_eq!(failed.stats.worker_failures, 2);
        assert!(failed.failures().all(|f| matches!(
            &f.reason,
            FailureReason::WorkerFailure(msg) if msg.contains("poisoned batch")
        )));
    }

    #[tokio::test]
    async fn test_shutdown_before_dispatch_cancels_everything() {
        let (tx, rx) = watch::channel(false);
        let scheduler = BatchScheduler::new(4, 2, rx);
        tx.send(true).unwrap();

        let handler = Arc::new(SlowHandler::new(Duration::from_millis(1)));
        let reports = scheduler.run(samples(10), handler.clone()).await;

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.stats.cancelled == r.outcomes.len()));
        assert_eq!(handler.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_channel_flushes_partial_batch_on_close() {
        let (_tx, rx) = watch::channel(false);
        let scheduler = BatchScheduler::new(4, 2, rx);
        let handler = Arc::new(SlowHandler::new(Duration::from_millis(1)));

        let (sample_tx, sample_rx) = mpsc::channel(16);
        let mut reports = scheduler.dispatch_channel(sample_rx, handler, |_| Ok(()));

        for sample in samples(6) {
            sample_tx.send(sample).await.unwrap();
        }
        drop(sample_tx);

        let mut sizes = Vec::new();
        while let Some(report) = reports.recv().await {
            sizes.push(report.stats.samples);
        }
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_channel_screen_rejects_single_sample() {
        let (_tx, rx) = watch::channel(false);
        let scheduler = BatchScheduler::new(4, 2, rx);
        let handler = Arc::new(SlowHandler::new(Duration::from_millis(1)));

        let (sample_tx, sample_rx) = mpsc::channel(16);
        let mut reports = scheduler.dispatch_channel(sample_rx, handler, |s: &Sample| {
            if s.dim() == 1 {
                Ok(())
            } else {
                Err(format!("width {}", s.dim()))
            }
        });

        sample_tx.send(Sample::new(SampleId(0), vec![0.1])).await.unwrap();
        sample_tx.send(Sample::new(SampleId(1), vec![0.1, 0.2])).await.unwrap();
        sample_tx.send(Sample::new(SampleId(2), vec![0.3])).await.unwrap();
        drop(sample_tx);

        let mut collected = Vec::new();
        while let Some(report) = reports.recv().await {
            collected.push(report);
        }

        assert_eq!(collected.len(), 2);
        let rejected: Vec<_> = collected.iter().filter(|r| r.stats.rejected > 0).collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].outcomes.len(), 1);
        assert_eq!(
            rejected[0].failures().next().map(|f| f.sample_id),
            Some(SampleId(1))
        );
        let batched: usize = collected
            .iter()
            .filter(|r| r.stats.rejected == 0)
            .map(|r| r.stats.samples)
            .sum();
        assert_eq!(batched, 2);
    }

    #[tokio::test]
    async fn test_shutdown_reports_queued_channel_samples() {
        let (tx, rx) = watch::channel(false);
        let scheduler = BatchScheduler::new(4, 2, rx);
        let handler = Arc::new(SlowHandler::new(Duration::from_millis(1)));

        let (sample_tx, sample_rx) = mpsc::channel(16);
        for sample in samples(10) {
            sample_tx.send(sample).await.unwrap();
        }
        tx.send(true).unwrap();

        let mut reports = scheduler.dispatch_channel(sample_rx, handler.clone(), |_| Ok(()));
        let mut cancelled = 0;
        while let Some(report) = reports.recv().await {
            assert_eq!(report.stats.cancelled, report.outcomes.len());
            cancelled += report.stats.cancelled;
        }

        assert_eq!(cancelled, 10);
        assert_eq!(handler.peak.load(Ordering::SeqCst), 0);
        assert!(sample_tx.send(samples(1).remove(0)).await.is_err());
    }
}
