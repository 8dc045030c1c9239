//! Configuration for the fusion engine
//!
//! `FusionConfig` is loaded once at startup, validated, wrapped in an `Arc`
//! and handed to every component. Nothing mutates it afterwards.

use crate::domain::value_objects::FusionMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Largest supported register; the state vector holds `2^n` amplitudes.
pub const MAX_QUBITS: usize = 16;

/// Configuration errors (fatal at startup)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Qubits in the simulated register
    pub n_qubits: usize,
    /// Entangling layers in the circuit
    pub quantum_depth: usize,
    /// Measurement repetitions per simulation
    pub shots: u32,
    pub fusion_mode: FusionMode,
    /// Nominal quantum contribution, in [0, 1]
    pub quantum_weight: f64,
    /// Extra quantum attempts after the first
    pub max_retries: u32,
    /// Deadline per quantum attempt (seconds)
    pub timeout_secs: u64,
    /// Largest acceptable quantum error estimate
    pub error_threshold: f64,
    /// Concurrent batches
    pub max_workers: usize,
    /// Samples per batch
    pub batch_size: usize,
    /// Expected sample dimensionality; inferred from the first sample when unset
    pub input_dim: Option<usize>,
    /// Classical hidden layer width
    pub hidden_size: usize,
    /// Classical embedding width
    pub output_size: usize,
    /// Seed for the reference simulator and network weights
    pub seed: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            n_qubits: 4,
            quantum_depth: 3,
            shots: 1000,
            fusion_mode: FusionMode::Attention,
            quantum_weight: 0.5,
            max_retries: 3,
            timeout_secs: 30,
            error_threshold: 0.1,
            max_workers: 4,
            batch_size: 32,
            input_dim: None,
            hidden_size: 16,
            output_size: 16,
            seed: 42,
        }
    }
}

impl FusionConfig {
    /// Check every field; the first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_qubits == 0 || self.n_qubits > MAX_QUBITS {
            return Err(invalid(
                "n_qubits",
                format!("must be in 1..={MAX_QUBITS}, got {}", self.n_qubits),
            ));
        }
        if self.quantum_depth == 0 {
            return Err(invalid("quantum_depth", "must be at least 1"));
        }
        if self.shots == 0 {
            return Err(invalid("shots", "must be at least 1"));
        }
        if !self.quantum_weight.is_finite() || !(0.0..=1.0).contains(&self.quantum_weight) {
            return Err(invalid(
                "quantum_weight",
                format!("must be in [0, 1], got {}", self.quantum_weight),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be at least 1"));
        }
        if !self.error_threshold.is_finite()
            || self.error_threshold <= 0.0
            || self.error_threshold > 1.0
        {
            return Err(invalid(
                "error_threshold",
                format!("must be in (0, 1], got {}", self.error_threshold),
            ));
        }
        if self.max_workers == 0 {
            return Err(invalid("max_workers", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.input_dim == Some(0) {
            return Err(invalid("input_dim", "must be at least 1 when set"));
        }
        if self.hidden_size == 0 {
            return Err(invalid("hidden_size", "must be at least 1"));
        }
        if self.output_size == 0 {
            return Err(invalid("output_size", "must be at least 1"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Length of the quantum feature vector (one probability per basis state).
    pub fn quantum_output_dim(&self) -> usize {
        1usize << self.n_qubits
    }

    /// Upper bound on quantum attempts per sample.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// ```toml
    /// [quantum]
    /// num_qubits = 4
    /// depth = 3
    /// shots = 1000
    ///
    /// [hybrid]
    /// fusion_mode = "attention"
    /// quantum_weight = 0.5
    /// max_retries = 3
    /// timeout_secs = 30
    /// error_threshold = 0.1
    ///
    /// [scheduler]
    /// max_workers = 4
    /// batch_size = 32
    ///
    /// [classical]
    /// input_dim = 4
    /// hidden_size = 16
    /// output_size = 16
    /// seed = 42
    /// ```
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let defaults = FusionConfig::default();
        let (q, h, s, c) = (file.quantum, file.hybrid, file.scheduler, file.classical);

        let fusion_mode = match h.fusion_mode {
            Some(mode) => mode
                .parse::<FusionMode>()
                .map_err(|reason| invalid("fusion_mode", reason))?,
            None => defaults.fusion_mode,
        };

        let config = FusionConfig {
            n_qubits: q.num_qubits.unwrap_or(defaults.n_qubits),
            quantum_depth: q.depth.unwrap_or(defaults.quantum_depth),
            shots: q.shots.unwrap_or(defaults.shots),
            fusion_mode,
            quantum_weight: h.quantum_weight.unwrap_or(defaults.quantum_weight),
            max_retries: h.max_retries.unwrap_or(defaults.max_retries),
            timeout_secs: h.timeout_secs.unwrap_or(defaults.timeout_secs),
            error_threshold: h.error_threshold.unwrap_or(defaults.error_threshold),
            max_workers: s.max_workers.unwrap_or(defaults.max_workers),
            batch_size: s.batch_size.unwrap_or(defaults.batch_size),
            input_dim: c.input_dim.or(defaults.input_dim),
            hidden_size: c.hidden_size.unwrap_or(defaults.hidden_size),
            output_size: c.output_size.unwrap_or(defaults.output_size),
            seed: c.seed.unwrap_or(defaults.seed),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration file structure.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    quantum: QuantumSection,
    #[serde(default)]
    hybrid: HybridSection,
    #[serde(default)]
    scheduler: SchedulerSection,
    #[serde(default)]
    classical: ClassicalSection,
}

#[derive(Debug, Default, Deserialize)]
struct QuantumSection {
    num_qubits: Option<usize>,
    depth: Option<usize>,
    shots: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct HybridSection {
    fusion_mode: Option<String>,
    quantum_weight: Option<f64>,
    max_retries: Option<u32>,
    timeout_secs: Option<u64>,
    error_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulerSection {
    max_workers: Option<usize>,
    batch_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassicalSection {
    input_dim: Option<usize>,
    hidden_size: Option<usize>,
    output_size: Option<usize>,
    seed: Option<u64>,
}
