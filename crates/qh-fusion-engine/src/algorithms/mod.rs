//! Algorithms for the fusion engine
//!
//! - `fusion`: weighted-sum, attention and concat kernels
//! - `batching`: order-preserving partitioning into bounded batches
//! - `mitigation`: acceptance thresholding and readout correction

pub mod batching;
pub mod fusion;
pub mod mitigation;

pub use batching::partition;
pub use fusion::{attention_score, effective_weight, fuse_vectors, sigmoid, FusedVector};
pub use mitigation::{mitigate, Rejection};
