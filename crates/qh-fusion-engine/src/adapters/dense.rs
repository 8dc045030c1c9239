//! Reference dense network
//!
//! `input → hidden (ReLU) → hidden/2 (ReLU) → output (sigmoid)` with
//! Xavier-uniform weights drawn from a seeded RNG. Inference only.

use crate::algorithms::fusion::sigmoid;
use crate::domain::errors::ClassicalError;
use crate::domain::value_objects::Sample;
use crate::ports::outbound::ClassicalModel;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Activation {
    Relu,
    Sigmoid,
}

#[derive(Clone, Debug)]
struct DenseLayer {
    /// Row-major, `out_dim × in_dim`
    weights: Vec<f64>,
    bias: Vec<f64>,
    in_dim: usize,
    out_dim: usize,
    activation: Activation,
}

impl DenseLayer {
    fn xavier(in_dim: usize, out_dim: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f64).sqrt();
        let weights = (0..in_dim * out_dim)
            .map(|_| rng.gen_range(-limit..=limit))
            .collect();
        Self {
            weights,
            bias: vec![0.0; out_dim],
            in_dim,
            out_dim,
            activation,
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.out_dim)
            .map(|o| {
                let row = &self.weights[o * self.in_dim..(o + 1) * self.in_dim];
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + self.bias[o];
                match self.activation {
                    Activation::Relu => z.max(0.0),
                    Activation::Sigmoid => sigmoid(z),
                }
            })
            .collect()
    }
}

/// Three-layer perceptron
#[derive(Clone, Debug)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
    input_dim: usize,
    output_dim: usize,
}

impl DenseNetwork {
    pub fn new(input_dim: usize, hidden_size: usize, output_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let half = (hidden_size / 2).max(1);
        let layers = vec![
            DenseLayer::xavier(input_dim, hidden_size, Activation::Relu, &mut rng),
            DenseLayer::xavier(hidden_size, half, Activation::Relu, &mut rng),
            DenseLayer::xavier(half, output_size, Activation::Sigmoid, &mut rng),
        ];
        Self {
            layers,
            input_dim,
            output_dim: output_size,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Forward pass for a single feature vector.
    pub fn forward(&self, features: &[f64]) -> Result<Vec<f64>, ClassicalError> {
        if features.len() != self.input_dim {
            return Err(ClassicalError::InputDimension {
                expected: self.input_dim,
                actual: features.len(),
            });
        }

        let mut activations = features.to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        Ok(activations)
    }
}

#[async_trait]
impl ClassicalModel for DenseNetwork {
    async fn infer(&self, batch: &[Sample]) -> Result<Vec<Vec<f64>>, ClassicalError> {
        batch.iter().map(|s| self.forward(s.features())).collect()
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::SampleId;

    #[test]
    fn test_output_shape_and_range() {
        let net = DenseNetwork::new(4, 16, 8, 42);
        let out = net.forward(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = DenseNetwork::new(2, 8, 2, 7);
        let b = DenseNetwork::new(2, 8, 2, 7);
        assert_eq!(
            a.forward(&[0.3, 0.7]).unwrap(),
            b.forward(&[0.3, 0.7]).unwrap()
        );
    }

    #[test]
    fn test_rejects_wrong_input_dimension() {
        let net = DenseNetwork::new(4, 8, 2, 42);
        assert!(matches!(
            net.forward(&[1.0, 2.0]),
            Err(ClassicalError::InputDimension {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_infer_batch_order() {
        let net = DenseNetwork::new(2, 8, 3, 42);
        let batch = vec![
            Sample::new(SampleId(0), vec![0.1, 0.9]),
            Sample::new(SampleId(1), vec![0.8, 0.2]),
        ];
        let out = net.infer(&batch).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], net.forward(&[0.1, 0.9]).unwrap());
        assert_eq!(out[1], net.forward(&[0.8, 0.2]).unwrap());
    }
}
