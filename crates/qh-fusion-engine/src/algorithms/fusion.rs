//! Fusion kernels
//!
//! Pure vector math behind the three fusion modes. Inputs of different
//! length are zero-padded to the longer one before any element-wise step;
//! nothing is ever truncated.

use crate::domain::value_objects::FusionMode;

/// Output of a fusion kernel.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedVector {
    pub vector: Vec<f64>,
    /// Weight multiplying the quantum vector in the result
    pub applied_weight: f64,
    pub attention_score: Option<f64>,
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Zero-pad both vectors to the longer length.
pub fn pad_to_common(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let d = a.len().max(b.len());
    let mut pa = a.to_vec();
    let mut pb = b.to_vec();
    pa.resize(d, 0.0);
    pb.resize(d, 0.0);
    (pa, pb)
}

/// Weight after folding in the quantum error estimate.
///
/// Only degraded results are discounted; an error estimate of 1.0 zeroes
/// the weight.
pub fn effective_weight(quantum_weight: f64, degraded: bool, error_estimate: f64) -> f64 {
    if degraded {
        quantum_weight * (1.0 - error_estimate.clamp(0.0, 1.0))
    } else {
        quantum_weight
    }
}

/// `(1 - w) * classical + w * quantum`, element-wise on padded vectors.
pub fn weighted_sum(classical: &[f64], quantum: &[f64], w: f64) -> Vec<f64> {
    let (c, q) = pad_to_common(classical, quantum);
    c.iter()
        .zip(&q)
        .map(|(ci, qi)| (1.0 - w) * ci + w * qi)
        .collect()
}

/// `sigmoid(dot(c, q) / sqrt(d))` over the padded vectors.
///
/// Two empty vectors score 0.5 (sigmoid of zero).
pub fn attention_score(classical: &[f64], quantum: &[f64]) -> f64 {
    let (c, q) = pad_to_common(classical, quantum);
    let d = c.len();
    if d == 0 {
        return sigmoid(0.0);
    }
    sigmoid(dot(&c, &q) / (d as f64).sqrt())
}

/// Classical vector followed by the weighted quantum vector.
pub fn concat(classical: &[f64], quantum: &[f64], w: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(classical.len() + quantum.len());
    out.extend_from_slice(classical);
    out.extend(quantum.iter().map(|q| w * q));
    out
}

/// Run the kernel for `mode` with an already-effective weight.
pub fn fuse_vectors(mode: FusionMode, w_eff: f64, classical: &[f64], quantum: &[f64]) -> FusedVector {
    match mode {
        FusionMode::WeightedSum => FusedVector {
            vector: weighted_sum(classical, quantum, w_eff),
            applied_weight: w_eff,
            attention_score: None,
        },
        FusionMode::Attention => {
            let a = attention_score(classical, quantum);
            let aw = a * w_eff;
            FusedVector {
                vector: weighted_sum(classical, quantum, aw),
                applied_weight: aw,
                attention_score: Some(a),
            }
        }
        FusionMode::Concat => FusedVector {
            vector: concat(classical, quantum, w_eff),
            applied_weight: w_eff,
            attention_score: None,
        },
    }
}
