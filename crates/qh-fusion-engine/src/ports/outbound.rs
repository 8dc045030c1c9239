//! Outbound Ports (Driven Ports / SPI)
//!
//! The two computation paths are opaque strategies behind these traits.

use crate::domain::errors::{ClassicalError, QuantumError};
use crate::domain::value_objects::Sample;
use async_trait::async_trait;

/// Raw output of one quantum simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantumEstimate {
    /// Estimated feature vector
    pub vector: Vec<f64>,
    /// Variance/shot-noise estimate, 0.0 = exact
    pub error_estimate: f64,
}

impl QuantumEstimate {
    pub fn new(vector: Vec<f64>, error_estimate: f64) -> Self {
        Self {
            vector,
            error_estimate,
        }
    }
}

/// Conventional neural network
///
/// Returns one embedding per input sample, in input order.
#[async_trait]
pub trait ClassicalModel: Send + Sync {
    async fn infer(&self, batch: &[Sample]) -> Result<Vec<Vec<f64>>, ClassicalError>;

    /// Embedding width.
    fn output_dim(&self) -> usize;
}

/// Parameterized quantum-circuit simulation
#[async_trait]
pub trait QuantumSimulator: Send + Sync {
    /// Simulate one sample with `shots` measurement repetitions.
    async fn simulate(&self, sample: &Sample, shots: u32)
        -> Result<QuantumEstimate, QuantumError>;

    /// Feature vector width.
    fn output_dim(&self) -> usize;

    /// True when the vector is a measurement probability distribution.
    fn emits_distribution(&self) -> bool {
        false
    }
}
