//! Value objects for the fusion engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Position of a sample in the caller's submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleId(pub u64);

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Dispatch sequence number of a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Algorithm used to combine the classical and quantum vectors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FusionMode {
    /// `(1 - w) * classical + w * quantum`
    WeightedSum,
    /// Weight scaled by the sigmoid of the scaled dot product
    #[default]
    Attention,
    /// Classical vector followed by the weighted quantum vector
    Concat,
}

impl FusionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FusionMode::WeightedSum => "weighted-sum",
            FusionMode::Attention => "attention",
            FusionMode::Concat => "concat",
        }
    }
}

impl fmt::Display for FusionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FusionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted-sum" | "weighted_sum" => Ok(FusionMode::WeightedSum),
            "attention" => Ok(FusionMode::Attention),
            "concat" => Ok(FusionMode::Concat),
            other => Err(format!("unknown fusion mode: {other}")),
        }
    }
}

/// One input feature vector.
///
/// Features are shared behind an `Arc` so both paths can hold the sample
/// without copying; nothing can mutate them after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    id: SampleId,
    features: Arc<[f64]>,
}

impl Sample {
    pub fn new(id: SampleId, features: Vec<f64>) -> Self {
        Self {
            id,
            features: features.into(),
        }
    }

    pub fn id(&self) -> SampleId {
        self.id
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn dim(&self) -> usize {
        self.features.len()
    }

    /// True when every feature is a finite number.
    pub fn is_finite(&self) -> bool {
        self.features.iter().all(|x| x.is_finite())
    }
}

/// Wrap raw feature vectors into samples numbered in submission order.
pub fn samples_from_vectors(vectors: Vec<Vec<f64>>) -> Vec<Sample> {
    vectors
        .into_iter()
        .enumerate()
        .map(|(i, v)| Sample::new(SampleId(i as u64), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fusion_mode_parse() {
        assert_eq!("attention".parse::<FusionMode>(), Ok(FusionMode::Attention));
        assert_eq!(
            "Weighted-Sum".parse::<FusionMode>(),
            Ok(FusionMode::WeightedSum)
        );
        assert_eq!("concat".parse::<FusionMode>(), Ok(FusionMode::Concat));
        assert!("average".parse::<FusionMode>().is_err());
    }

    #[test]
    fn test_fusion_mode_default_is_attention() {
        assert_eq!(FusionMode::default(), FusionMode::Attention);
        assert_eq!(FusionMode::WeightedSum.to_string(), "weighted-sum");
    }

    #[test]
    fn test_sample_clone_shares_features() {
        let sample = Sample::new(SampleId(3), vec![0.1, 0.2]);
        let copy = sample.clone();
        assert_eq!(copy.id(), SampleId(3));
        assert_eq!(copy.features(), &[0.1, 0.2]);
        assert!(std::ptr::eq(
            sample.features().as_ptr(),
            copy.features().as_ptr()
        ));
    }

    #[test]
    fn test_non_finite_sample_detected() {
        let sample = Sample::new(SampleId(0), vec![1.0, f64::NAN]);
        assert!(!sample.is_finite());
    }

    #[test]
    fn test_samples_numbered_in_order() {
        let samples = samples_from_vectors(vec![vec![1.0], vec![2.0], vec![3.0]]);
        let ids: Vec<_> = samples.iter().map(|s| s.id().0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
