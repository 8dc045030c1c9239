//! Resilience Controller
//!
//! Wraps every quantum simulation with a deadline, a bounded retry loop and
//! acceptance thresholding. When the budget runs out the sample gets a
//! degraded zero vector instead of an error, so the quantum path can slow a
//! batch down but never block it.
//!
//! ```text
//! attempt 1 ──timeout / error / rejected──→ attempt 2 → … → attempt max_retries+1
//!     │                                                          │
//!     └─accepted─→ Success                          exhausted ─→ Degraded (0⃗, error 1.0)
//! ```

use super::shutdown::cancelled;
use crate::algorithms::mitigation::mitigate;
use crate::config::FusionConfig;
use crate::domain::entities::PathResult;
use crate::domain::errors::{FusionError, QuantumError};
use crate::domain::value_objects::Sample;
use crate::ports::outbound::QuantumSimulator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

pub struct ResilienceController {
    simulator: Arc<dyn QuantumSimulator>,
    shots: u32,
    timeout: Duration,
    max_retries: u32,
    error_threshold: f64,
    shutdown: watch::Receiver<bool>,
}

impl ResilienceController {
    pub fn new(
        simulator: Arc<dyn QuantumSimulator>,
        config: &FusionConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            simulator,
            shots: config.shots,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            error_threshold: config.error_threshold,
            shutdown,
        }
    }

    pub fn output_dim(&self) -> usize {
        self.simulator.output_dim()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Run one sample through the retry loop.
    ///
    /// Returns `Err(FusionError::Cancelled)` only when shutdown is signalled;
    /// the in-flight attempt is dropped immediately.
    pub async fn execute(&self, sample: &Sample) -> Result<PathResult, FusionError> {
        let mut shutdown = self.shutdown.clone();
        let expected_dim = self.simulator.output_dim();
        let distribution = self.simulator.emits_distribution();

        for attempt in 1..=self.max_attempts() {
            let outcome = tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => {
                    debug!(sample_id = %sample.id(), attempt, "Quantum attempt abandoned on shutdown");
                    return Err(FusionError::Cancelled);
                }
                r = tokio::time::timeout(self.timeout, self.simulator.simulate(sample, self.shots)) => {
                    r.unwrap_or(Err(QuantumError::Timeout))
                }
            };

            let estimate = match outcome {
                Ok(estimate) => estimate,
                Err(e) => {
                    debug!(sample_id = %sample.id(), attempt, error = %e, "Quantum attempt failed");
                    continue;
                }
            };

            match mitigate(estimate, expected_dim, self.error_threshold, distribution) {
                Ok(accepted) => {
                    debug!(
                        sample_id = %sample.id(),
                        attempt,
                        error_estimate = accepted.error_estimate,
                        "Quantum estimate accepted"
                    );
                    return Ok(
                        PathResult::success(accepted.vector, accepted.error_estimate)
                            .with_attempts(attempt),
                    );
                }
                Err(rejection) => {
                    debug!(sample_id = %sample.id(), attempt, %rejection, "Quantum estimate rejected");
                }
            }
        }

        warn!(
            sample_id = %sample.id(),
            attempts = self.max_attempts(),
            "Quantum retries exhausted, degrading to classical-only"
        );
        Ok(PathResult::degraded(expected_dim, self.max_attempts()))
    }
}
