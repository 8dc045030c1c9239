//! Application layer for the fusion engine
//!
//! - `classical`: classical path executor
//! - `resilience`: timeout, retry and degradation around the quantum path
//! - `fusion_engine`: per-sample fusion with provenance
//! - `scheduler`: bounded batching and worker pool
//! - `service`: `HybridInferenceApi` implementation
//! - `shutdown`: cancellation signal shared by all of the above

pub mod classical;
pub mod fusion_engine;
pub mod resilience;
pub mod scheduler;
pub mod service;
pub mod shutdown;

pub use classical::ClassicalExecutor;
pub use fusion_engine::FusionEngine;
pub use resilience::ResilienceController;
pub use scheduler::{BatchHandler, BatchScheduler};
pub use service::{FusionPipeline, HybridFusionService};
