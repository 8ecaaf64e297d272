//! Pipeline configuration

use crate::anomaly::MaxSamples;
use crate::ensemble::{validate_levels, EnsembleParams};
use crate::error::{DafuError, Result};
use crate::policy::DetectionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Levels trained for the classic comparison workflow when none are given
pub const DEFAULT_CLASSIC_LEVELS: [f64; 3] = [0.01, 0.05, 0.1];
/// Level trained for the risk-threshold policy when none is given
pub const DEFAULT_RISK_LEVEL: f64 = 0.1;

/// Complete, validated description of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ground-truth column; absent means fully unsupervised
    pub label_column: Option<String>,

    /// Fit detectors only on rows labelled normal
    pub use_labels_for_training: bool,

    /// `None` uses the policy's default levels
    pub contamination_levels: Option<Vec<f64>>,

    pub detection_policy: DetectionPolicy,

    pub ensemble: EnsembleParams,

    /// Train despite too few rows or numerical features
    pub allow_insufficient_data: bool,

    /// Unique ratio above which a categorical column is dropped
    pub high_cardinality_ratio: f64,

    /// Variance below which a numerical column is dropped
    pub low_variance_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label_column: None,
            use_labels_for_training: false,
            contamination_levels: None,
            detection_policy: DetectionPolicy::Classic,
            ensemble: EnsembleParams::default(),
            allow_insufficient_data: false,
            high_cardinality_ratio: 0.5,
            low_variance_threshold: 0.01,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; omitted fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DafuError::DataError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = Some(column.into());
        self
    }

    pub fn with_labels_for_training(mut self, enabled: bool) -> Self {
        self.use_labels_for_training = enabled;
        self
    }

    pub fn with_contamination_levels(mut self, levels: Vec<f64>) -> Self {
        self.contamination_levels = Some(levels);
        self
    }

    pub fn with_detection_policy(mut self, policy: DetectionPolicy) -> Self {
        self.detection_policy = policy;
        self
    }

    pub fn with_ensemble(mut self, params: EnsembleParams) -> Self {
        self.ensemble = params;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.ensemble.random_seed = seed;
        self
    }

    pub fn with_allow_insufficient_data(mut self, allow: bool) -> Self {
        self.allow_insufficient_data = allow;
        self
    }

    /// Levels to train: explicit levels, else the policy default
    pub fn effective_contamination_levels(&self) -> Vec<f64> {
        match (&self.contamination_levels, self.detection_policy) {
            (Some(levels), _) => levels.clone(),
            (None, DetectionPolicy::Classic) => DEFAULT_CLASSIC_LEVELS.to_vec(),
            (None, DetectionPolicy::RiskThreshold { .. }) => vec![DEFAULT_RISK_LEVEL],
        }
    }

    /// Reject invalid settings before any work starts
    pub fn validate(&self) -> Result<()> {
        validate_levels(&self.effective_contamination_levels())?;
        self.detection_policy.validate()?;

        let e = &self.ensemble;
        if e.n_estimators == 0 {
            return Err(DafuError::invalid_parameter("n_estimators", 0, "must be positive"));
        }
        match e.max_samples {
            MaxSamples::Count(0) => {
                return Err(DafuError::invalid_parameter("max_samples", 0, "must be positive"));
            }
            MaxSamples::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(DafuError::invalid_parameter(
                    "max_samples",
                    f,
                    "fraction must be in (0, 1]",
                ));
            }
            _ => {}
        }
        if !(e.max_features > 0.0 && e.max_features <= 1.0) {
            return Err(DafuError::invalid_parameter(
                "max_features",
                e.max_features,
                "must be in (0, 1]",
            ));
        }
        if self.use_labels_for_training && self.label_column.is_none() {
            return Err(DafuError::invalid_parameter(
                "use_labels_for_training",
                true,
                "requires a label column",
            ));
        }
        if !(self.high_cardinality_ratio > 0.0 && self.high_cardinality_ratio <= 1.0) {
            return Err(DafuError::invalid_parameter(
                "high_cardinality_ratio",
                self.high_cardinality_ratio,
                "must be in (0, 1]",
            ));
        }
        if !(self.low_variance_threshold >= 0.0) {
            return Err(DafuError::invalid_parameter(
                "low_variance_threshold",
                self.low_variance_threshold,
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_levels_follow_policy() {
        let classic = PipelineConfig::new();
        assert_eq!(classic.effective_contamination_levels(), vec![0.01, 0.05, 0.1]);

        let risk = PipelineConfig::new()
            .with_detection_policy(DetectionPolicy::RiskThreshold { threshold: 0.8 });
        assert_eq!(risk.effective_contamination_levels(), vec![0.1]);

        let explicit = risk.with_contamination_levels(vec![0.2]);
        assert_eq!(explicit.effective_contamination_levels(), vec![0.2]);
    }

    #[test]
    fn test_validation_fails_fast() {
        assert!(PipelineConfig::new().validate().is_ok());
        assert!(PipelineConfig::new()
            .with_contamination_levels(vec![0.0])
            .validate()
            .is_err());
        assert!(PipelineConfig::new()
            .with_detection_policy(DetectionPolicy::RiskThreshold { threshold: 1.5 })
            .validate()
            .is_err());
        assert!(PipelineConfig::new()
            .with_labels_for_training(true)
            .validate()
            .is_err());

        let mut config = PipelineConfig::new();
        config.ensemble.max_samples = MaxSamples::Fraction(1.5);
        assert!(matches!(
            config.validate(),
            Err(DafuError::InvalidParameter { ref name, .. }) if name == "max_samples"
        ));
    }

    #[test]
    fn test_json_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "label_column": "is_fraud",
                "detection_policy": {"RiskThreshold": {"threshold": 0.7}},
                "ensemble": {"n_estimators": 50, "max_samples": {"Count": 128},
                             "max_features": 1.0, "bootstrap": false, "random_seed": 7}
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.label_column.as_deref(), Some("is_fraud"));
        assert_eq!(config.ensemble.max_samples, MaxSamples::Count(128));
        assert_eq!(config.effective_contamination_levels(), vec![0.1]);
        assert!(!config.allow_insufficient_data);
    }
}
