//! Reference state-vector simulator
//!
//! Real-amplitude simulation of an angle-encoding circuit:
//!
//! ```text
//! |0…0⟩ ─┬─ RY(π·x₀) ─●──────── … ─┬─ measure (shots)
//!        ├─ RY(π·x₁) ─X──●───── … ─┤
//!        ├─ RY(π·x₂) ────X──●── … ─┤
//!        └─ RY(π·x₃) ───────X── … ─┘
//!             └───── repeated `depth` times ─────┘
//! ```
//!
//! RY and CNOT keep amplitudes real, so the state is a `Vec<f64>`. The output
//! is the empirical distribution over the `2^n` basis states. The RNG is seeded
//! from the configured seed and the sample id, so a sample's estimate does not
//! depend on which worker ran it.
//!
//! The computation runs on a blocking thread. When the awaiting future is
//! dropped (attempt timed out or abandoned) the thread stops at the next
//! layer or shot chunk instead of running to completion.

use crate::domain::errors::QuantumError;
use crate::domain::value_objects::Sample;
use crate::ports::outbound::{QuantumEstimate, QuantumSimulator};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mixes the sample id into the seed.
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Shots drawn between abandonment checks.
const SHOT_CHUNK: u32 = 1024;

/// Raises the flag when the owning future is dropped.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Shape of the simulated circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircuitSummary {
    pub n_qubits: usize,
    pub classical_bits: usize,
    pub layers: usize,
    pub gate_count: usize,
}

/// Angle-encoding circuit simulator
#[derive(Clone, Debug)]
pub struct StateVectorSimulator {
    n_qubits: usize,
    depth: usize,
    seed: u64,
}

impl StateVectorSimulator {
    pub fn new(n_qubits: usize, depth: usize, seed: u64) -> Self {
        Self {
            n_qubits,
            depth,
            seed,
        }
    }

    pub fn circuit_summary(&self) -> CircuitSummary {
        let cnots = self.n_qubits.saturating_sub(1);
        CircuitSummary {
            n_qubits: self.n_qubits,
            classical_bits: self.n_qubits,
            layers: self.depth,
            gate_count: self.depth * (self.n_qubits + cnots),
        }
    }

    /// Exact basis-state probabilities for `features`.
    pub fn probabilities(&self, features: &[f64]) -> Vec<f64> {
        run_circuit(self.n_qubits, self.depth, features, &AtomicBool::new(false))
            .unwrap_or_default()
            .into_iter()
            .map(|a| a * a)
            .collect()
    }
}

fn apply_ry(state: &mut [f64], qubit: usize, theta: f64) {
    let (s, c) = (theta / 2.0).sin_cos();
    let mask = 1usize << qubit;
    for i in 0..state.len() {
        if i & mask == 0 {
            let j = i | mask;
            let (a0, a1) = (state[i], state[j]);
            state[i] = c * a0 - s * a1;
            state[j] = s * a0 + c * a1;
        }
    }
}

fn apply_cnot(state: &mut [f64], control: usize, target: usize) {
    let cmask = 1usize << control;
    let tmask = 1usize << target;
    for i in 0..state.len() {
        if i & cmask != 0 && i & tmask == 0 {
            state.swap(i, i | tmask);
        }
    }
}

/// Final amplitudes, or `None` once `abandoned` is raised.
fn run_circuit(
    n_qubits: usize,
    depth: usize,
    features: &[f64],
    abandoned: &AtomicBool,
) -> Option<Vec<f64>> {
    let mut state = vec![0.0; 1usize << n_qubits];
    state[0] = 1.0;

    for _ in 0..depth {
        if abandoned.load(Ordering::Relaxed) {
            return None;
        }
        for q in 0..n_qubits {
            // Missing features encode as 0
            let x = features.get(q).copied().unwrap_or(0.0);
            apply_ry(&mut state, q, PI * x);
        }
        for q in 0..n_qubits.saturating_sub(1) {
            apply_cnot(&mut state, q, q + 1);
        }
    }

    Some(state)
}

/// Draw `shots` measurements and return (empirical distribution, error).
///
/// The error is the largest binomial standard error over basis states.
fn sample_counts(
    probs: &[f64],
    shots: u32,
    rng: &mut StdRng,
    abandoned: &AtomicBool,
) -> Option<(Vec<f64>, f64)> {
    let mut counts = vec![0u32; probs.len()];
    for shot in 0..shots {
        if shot % SHOT_CHUNK == 0 && abandoned.load(Ordering::Relaxed) {
            return None;
        }
        let r: f64 = rng.gen();
        let mut acc = 0.0;
        let mut idx = probs.len() - 1;
        for (k, p) in probs.iter().enumerate() {
            acc += p;
            if r < acc {
                idx = k;
                break;
            }
        }
        counts[idx] += 1;
    }

    let n = f64::from(shots);
    let dist: Vec<f64> = counts.iter().map(|&c| f64::from(c) / n).collect();
    let error = dist
        .iter()
        .map(|p| (p * (1.0 - p) / n).sqrt())
        .fold(0.0, f64::max);
    Some((dist, error))
}

#[async_trait]
impl QuantumSimulator for StateVectorSimulator {
    async fn simulate(
        &self,
        sample: &Sample,
        shots: u32,
    ) -> Result<QuantumEstimate, QuantumError> {
        if shots == 0 {
            return Err(QuantumError::Backend("shots must be positive".into()));
        }

        let features = sample.features().to_vec();
        let (n_qubits, depth) = (self.n_qubits, self.depth);
        let seed = self.seed ^ sample.id().0.wrapping_mul(SEED_MIX);

        let abandoned = Arc::new(AtomicBool::new(false));
        let _guard = AbandonOnDrop(abandoned.clone());

        // Off the async workers so the caller's deadline can abandon it
        let (vector, error) = tokio::task::spawn_blocking(move || {
            let probs: Vec<f64> = run_circuit(n_qubits, depth, &features, &abandoned)?
                .into_iter()
                .map(|a| a * a)
                .collect();
            let mut rng = StdRng::seed_from_u64(seed);
            sample_counts(&probs, shots, &mut rng, &abandoned)
        })
        .await
        .map_err(|e| QuantumError::Backend(e.to_string()))?
        .ok_or_else(|| QuantumError::Backend("simulation abandoned".into()))?;

        if vector.iter().any(|p| !p.is_finite()) {
            return Err(QuantumError::NumericInstability(
                "non-finite probability".into(),
            ));
        }

        Ok(QuantumEstimate::new(vector, error))
    }

    fn output_dim(&self) -> usize {
        1usize << self.n_qubits
    }

    fn emits_distribution(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::SampleId;

    #[test]
    fn test_zero_input_stays_in_ground_state() {
        let sim = StateVectorSimulator::new(3, 2, 42);
        let probs = sim.probabilities(&[0.0, 0.0, 0.0]);
        assert!((probs[0] - 1.0).abs() < 1e-12);
        assert!(probs[1..].iter().all(|p| p.abs() < 1e-12));
    }

    #[test]
    fn test_single_layer_bell_like_state() {
        // RY(π/2) on q0 then CNOT(0,1): (|00⟩ + |11⟩)/√2
        let sim = StateVectorSimulator::new(2, 1, 42);
        let probs = sim.probabilities(&[0.5, 0.0]);
        assert!((probs[0b00] - 0.5).abs() < 1e-12);
        assert!((probs[0b11] - 0.5).abs() < 1e-12);
        assert!(probs[0b01].abs() < 1e-12);
        assert!(probs[0b10].abs() < 1e-12);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let sim = StateVectorSimulator::new(4, 3, 42);
        let probs = sim.probabilities(&[0.1, 0.7, 0.3, 0.9]);
        let total: f64 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(probs.len(), 16);
    }

    #[test]
    fn test_circuit_summary() {
        let summary = StateVectorSimulator::new(4, 3, 42).circuit_summary();
        assert_eq!(summary.n_qubits, 4);
        assert_eq!(summary.classical_bits, 4);
        assert_eq!(summary.layers, 3);
        assert_eq!(summary.gate_count, 21);
    }

    #[tokio::test]
    async fn test_simulate_is_deterministic_per_sample() {
        let sim = StateVectorSimulator::new(2, 2, 42);
        let sample = Sample::new(SampleId(9), vec![0.3, 0.8]);

        let a = sim.simulate(&sample, 1000).await.unwrap();
        let b = sim.simulate(&sample, 1000).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.vector.len(), 4);

        let total: f64 = a.vector.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        // Binomial standard error never exceeds 0.5 / sqrt(shots)
        assert!(a.error_estimate <= 0.5 / (1000f64).sqrt() + 1e-12);
    }

    #[tokio::test]
    async fn test_simulate_rejects_zero_shots() {
        let sim = StateVectorSimulator::new(2, 1, 42);
        let sample = Sample::new(SampleId(0), vec![0.1, 0.2]);
        assert!(matches!(
            sim.simulate(&sample, 0).await,
            Err(QuantumError::Backend(_))
        ));
    }

    #[test]
    fn test_raised_flag_stops_circuit_and_sampling() {
        let abandoned = AtomicBool::new(true);
        assert!(run_circuit(4, 3, &[0.1, 0.2, 0.3, 0.4], &abandoned).is_none());

        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_counts(&[0.5, 0.5], 10_000, &mut rng, &abandoned).is_none());
    }

    #[tokio::test]
    async fn test_dropped_attempt_raises_abandon_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        {
            let _guard = AbandonOnDrop(flag.clone());
            assert!(!flag.load(Ordering::Relaxed));
        }
        assert!(flag.load(Ordering::Relaxed));

        let sim = StateVectorSimulator::new(12, 4, 42);
        let sample = Sample::new(SampleId(3), vec![0.5; 12]);
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_nanos(1),
            sim.simulate(&sample, 1_000_000),
        )
        .await;
        assert!(timed_out.is_err());
    }
}
