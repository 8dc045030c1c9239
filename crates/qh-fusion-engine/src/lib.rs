//! # QH Fusion Engine
//!
//! Hybrid quantum/classical inference core. Every sample runs through two
//! computation paths and the per-sample outputs are merged into one vector.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Pipeline
//!
//! ```text
//!                  ┌──────────────────────────┐
//!  samples ──────→ │      BatchScheduler      │  ≤ batch_size per batch
//!                  │  (≤ max_workers permits) │  ≤ max_workers in flight
//!                  └────────────┬─────────────┘
//!                               │ Batch
//!              ┌────────────────┴────────────────┐
//!              ↓                                 ↓
//!   ┌─────────────────────┐          ┌──────────────────────┐
//!   │ ClassicalExecutor   │          │ ResilienceController │  timeout + retry
//!   │  (ClassicalModel)   │          │  (QuantumSimulator)  │  + degradation
//!   └──────────┬──────────┘          └──────────┬───────────┘
//!              └────────────────┬────────────────┘
//!                               ↓ join
//!                     ┌───────────────────┐
//!                     │   FusionEngine    │  weighted-sum | attention | concat
//!                     └─────────┬─────────┘
//!                               ↓
//!                          BatchReport
//! ```
//!
//! ## Failure Semantics
//!
//! | Failure | Scope | Effect |
//! |---------|-------|--------|
//! | Classical failure | sample | no fused result for that sample |
//! | Quantum degraded | sample | fused with zero quantum contribution |
//! | Worker failure | batch | every member sample failed |
//! | Configuration error | startup | engine never starts |
//!
//! ## Module Structure
//!
//! ```text
//! qh-fusion-engine/
//! ├── config.rs        # FusionConfig + TOML loading
//! ├── domain/          # Sample, Batch, PathResult, FusedResult, errors, invariants
//! ├── algorithms/      # Fusion kernels, batch partitioning, mitigation
//! ├── ports/           # HybridInferenceApi, ClassicalModel, QuantumSimulator
//! ├── adapters/        # Reference state-vector simulator and dense network
//! └── application/     # Executors, resilience, fusion engine, scheduler, service
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::{DenseNetwork, StateVectorSimulator};
pub use application::{
    BatchScheduler, ClassicalExecutor, FusionEngine, HybridFusionService, ResilienceController,
};
pub use config::{ConfigError, FusionConfig};
pub use domain::{
    Batch, BatchId, BatchReport, BatchStats, FailureReason, FusedResult, FusionError, FusionMode,
    PathResult, PathStatus, Provenance, Sample, SampleFailure, SampleId, SampleOutcome,
};
pub use ports::{
    ClassicalError, ClassicalModel, HybridInferenceApi, QuantumError, QuantumEstimate,
    QuantumSimulator,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
