//! Quantum estimate acceptance and readout mitigation
//!
//! Every raw simulator estimate passes through `mitigate` before it may be
//! fused. Rejections count as failed attempts in the resilience loop.

use crate::ports::outbound::QuantumEstimate;
use thiserror::Error;

/// Tolerance below which negative probabilities are treated as readout noise.
const NEGATIVE_TOLERANCE: f64 = 1e-9;

/// Why an estimate was not accepted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("non-finite value in estimate")]
    NonFinite,

    #[error("estimate has {actual} components, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("error estimate {error} exceeds threshold {threshold}")]
    AboveThreshold { error: f64, threshold: f64 },

    #[error("probability {0} is below zero")]
    NegativeProbability(f64),

    #[error("distribution has no probability mass")]
    EmptyDistribution,
}

/// Accept or reject an estimate; accepted distributions are renormalized.
///
/// When `distribution` is set, the vector is a measurement probability
/// distribution: readout noise below zero is clamped and the result is
/// rescaled to unit mass.
pub fn mitigate(
    estimate: QuantumEstimate,
    expected_dim: usize,
    error_threshold: f64,
    distribution: bool,
) -> Result<QuantumEstimate, Rejection> {
    let QuantumEstimate {
        mut vector,
        error_estimate,
    } = estimate;

    if !error_estimate.is_finite() || vector.iter().any(|x| !x.is_finite()) {
        return Err(Rejection::NonFinite);
    }

    if vector.len() != expected_dim {
        return Err(Rejection::DimensionMismatch {
            expected: expected_dim,
            actual: vector.len(),
        });
    }

    if error_estimate > error_threshold {
        return Err(Rejection::AboveThreshold {
            error: error_estimate,
            threshold: error_threshold,
        });
    }

    if distribution {
        if let Some(&p) = vector.iter().find(|&&p| p < -NEGATIVE_TOLERANCE) {
            return Err(Rejection::NegativeProbability(p));
        }
        for p in vector.iter_mut() {
            *p = p.max(0.0);
        }
        let mass: f64 = vector.iter().sum();
        if mass <= 0.0 {
            return Err(Rejection::EmptyDistribution);
        }
        for p in vector.iter_mut() {
            *p /= mass;
        }
    }

    Ok(QuantumEstimate {
        vector,
        error_estimate: error_estimate.max(0.0),
    })
}
