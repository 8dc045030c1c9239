//! # Fusion Node
//!
//! Runs a submission through the hybrid fusion engine with the reference
//! state-vector simulator and dense network.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics) from `QH_*` env
//! 2. Load configuration (TOML file, then env overrides), validate
//! 3. Read samples (JSON file or stdin)
//! 4. Run the scheduler; print one JSON line per batch report
//! 5. Ctrl-C cancels in-flight work; remaining batches report `cancelled`
//!
//! ```bash
//! fusion-node --config fusion.toml --input samples.json --stream --metrics
//! echo '[[0.1,0.2,0.3,0.4]]' | fusion-node
//! ```

mod setup;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use fusion_telemetry::{init_telemetry, metrics, TelemetryConfig};
use qh_fusion_engine::{BatchReport, HybridFusionService, HybridInferenceApi};

/// Hybrid quantum/classical fusion runner
#[derive(Parser, Debug)]
#[command(name = "fusion-node")]
#[command(about = "Fuse quantum-circuit and neural-network outputs for a batch of samples")]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON array of feature vectors; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Print reports as batches complete instead of in batch order
    #[arg(long)]
    stream: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

#[derive(Default)]
struct RunSummary {
    batches: usize,
    samples: usize,
    fused: usize,
    classical_failures: usize,
    quantum_degraded: usize,
    cancelled: usize,
    rejected: usize,
}

impl RunSummary {
    fn add(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.samples += report.stats.samples;
        self.fused += report.stats.fused;
        self.classical_failures += report.stats.classical_failures;
        self.quantum_degraded += report.stats.quantum_degraded;
        self.cancelled += report.stats.cancelled;
        self.rejected += report.stats.rejected;
    }
}

fn emit(report: &BatchReport, summary: &mut RunSummary) -> Result<()> {
    metrics::record_batch(report);
    summary.add(report);
    let line = serde_json::to_string(report).context("serializing batch report")?;
    println!("{line}");
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = setup::load_config(args.config.as_deref())?;
    let service = Arc::new(
        HybridFusionService::with_reference_models(config).context("starting fusion service")?,
    );
    let samples = setup::read_samples(args.input.as_deref())?;

    {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, cancelling");
                service.shutdown();
            }
        });
    }

    metrics::record_submission(samples.len());
    let mut summary = RunSummary::default();

    if args.stream {
        let mut reports = service.infer_stream(samples).await?;
        while let Some(report) = reports.recv().await {
            metrics::set_active_workers(service.scheduler().active_workers());
            emit(&report, &mut summary)?;
        }
    } else {
        for report in service.infer(samples).await? {
            emit(&report, &mut summary)?;
        }
    }
    metrics::set_active_workers(service.scheduler().active_workers());

    info!(
        batches = summary.batches,
        samples = summary.samples,
        fused = summary.fused,
        classical_failures = summary.classical_failures,
        quantum_degraded = summary.quantum_degraded,
        cancelled = summary.cancelled,
        rejected = summary.rejected,
        peak_workers = service.scheduler().peak_workers(),
        "Run complete"
    );

    if args.metrics {
        print!("{}", fusion_telemetry::gather_text()?);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _telemetry = init_telemetry(TelemetryConfig::from_env())?;

    if let Err(e) = run(args).await {
        error!(error = %format!("{e:#}"), "Fusion node failed");
        return Err(e);
    }

    Ok(())
}
