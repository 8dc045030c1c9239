//! Configuration and input loading for the runner.

use anyhow::{Context, Result};
use qh_fusion_engine::domain::samples_from_vectors;
use qh_fusion_engine::{FusionConfig, FusionMode, Sample};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Load `path` if given, else defaults; then apply `QH_*` overrides.
pub fn load_config(path: Option<&Path>) -> Result<FusionConfig> {
    let mut config = match path {
        Some(path) => FusionConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FusionConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply environment overrides. Unparseable values are ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut FusionConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("QH_MAX_WORKERS") {
        match v.parse() {
            Ok(n) => config.max_workers = n,
            Err(_) => warn!(value = %v, "QH_MAX_WORKERS must be an integer"),
        }
    }
    if let Some(v) = lookup("QH_BATCH_SIZE") {
        match v.parse() {
            Ok(n) => config.batch_size = n,
            Err(_) => warn!(value = %v, "QH_BATCH_SIZE must be an integer"),
        }
    }
    if let Some(v) = lookup("QH_FUSION_MODE") {
        match v.parse::<FusionMode>() {
            Ok(mode) => config.fusion_mode = mode,
            Err(reason) => warn!(value = %v, %reason, "Ignoring QH_FUSION_MODE"),
        }
    }
    if let Some(v) = lookup("QH_QUANTUM_WEIGHT") {
        match v.parse() {
            Ok(w) => config.quantum_weight = w,
            Err(_) => warn!(value = %v, "QH_QUANTUM_WEIGHT must be a number"),
        }
    }
}

/// Parse a JSON array of feature vectors.
pub fn parse_samples(json: &str) -> Result<Vec<Sample>> {
    let vectors: Vec<Vec<f64>> =
        serde_json::from_str(json).context("input must be a JSON array of number arrays")?;
    Ok(samples_from_vectors(vectors))
}

/// Read samples from `path`, or stdin when `None`.
pub fn read_samples(path: Option<&Path>) -> Result<Vec<Sample>> {
    let json = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading input from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading input from stdin")?;
            buf
        }
    };
    let samples = parse_samples(&json)?;
    info!(samples = samples.len(), "Input loaded");
    Ok(samples)
}
