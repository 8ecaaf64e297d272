//! Per-contamination ensemble training

use super::model::{same_level, EnsembleMember, EnsembleModel};
use crate::anomaly::{AnomalyDetector, IsolationForest, IsolationForestParams, MaxSamples};
use crate::error::{DafuError, Result};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Hyperparameters shared by every ensemble member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleParams {
    pub n_estimators: usize,
    pub max_samples: MaxSamples,
    pub max_features: f64,
    pub bootstrap: bool,
    pub random_seed: u64,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: MaxSamples::Auto,
            max_features: 1.0,
            bootstrap: false,
            random_seed: 42,
        }
    }
}

impl EnsembleParams {
    /// Forest parameters for one contamination level
    pub fn forest_params(&self, contamination: f64) -> IsolationForestParams {
        IsolationForestParams {
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            max_features: self.max_features,
            bootstrap: self.bootstrap,
            contamination,
            seed: self.random_seed,
        }
    }
}

/// Fits one detector per contamination level
#[derive(Debug, Clone, Default)]
pub struct EnsembleTrainer {
    params: EnsembleParams,
}

impl EnsembleTrainer {
    pub fn new(params: EnsembleParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EnsembleParams {
        &self.params
    }

    /// Train on `x` and record score ranges over the same matrix
    pub fn train(&self, x: &Array2<f64>, contamination_levels: &[f64]) -> Result<EnsembleModel> {
        self.train_with_reference(x, x, contamination_levels)
    }

    /// Train on `fit_rows` and record score ranges over `reference`.
    ///
    /// `reference` is the full transformed training matrix; `fit_rows` may be a
    /// subset of it (e.g. known-normal rows in semi-supervised mode).
    pub fn train_with_reference(
        &self,
        fit_rows: &Array2<f64>,
        reference: &Array2<f64>,
        contamination_levels: &[f64],
    ) -> Result<EnsembleModel> {
        validate_levels(contamination_levels)?;
        if fit_rows.ncols() != reference.ncols() {
            return Err(DafuError::ShapeError {
                expected: format!("{} features", reference.ncols()),
                actual: format!("{} features", fit_rows.ncols()),
            });
        }

        let start = Instant::now();
        info!(
            levels = ?contamination_levels,
            rows = fit_rows.nrows(),
            features = fit_rows.ncols(),
            estimators = self.params.n_estimators,
            "Training anomaly ensemble"
        );

        let members = contamination_levels
            .par_iter()
            .map(|&contamination| self.train_member(fit_rows, reference, contamination))
            .collect::<Result<Vec<_>>>()?;

        info!(
            members = members.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ensemble training complete"
        );

        Ok(EnsembleModel::new(members, reference.ncols()))
    }

    fn train_member(
        &self,
        fit_rows: &Array2<f64>,
        reference: &Array2<f64>,
        contamination: f64,
    ) -> Result<EnsembleMember> {
        let mut detector = IsolationForest::new(self.params.forest_params(contamination));
        detector.fit(fit_rows)?;

        let scores = detector.decision_function(reference)?;
        let (min_score, max_score) = scores
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
                (lo.min(s), hi.max(s))
            });

        let member = EnsembleMember {
            contamination,
            detector,
            min_score,
            max_score,
        };

        if member.has_degenerate_range() {
            warn!(
                contamination,
                score = min_score,
                "Training scores are constant; risk scores will be 0.0"
            );
        }
        info!(
            contamination,
            min_score,
            max_score,
            flagged = scores.iter().filter(|&&s| s < 0.0).count(),
            "Ensemble member trained"
        );

        Ok(member)
    }
}

/// Contamination levels must be non-empty, unique and inside (0, 1)
pub fn validate_levels(levels: &[f64]) -> Result<()> {
    if levels.is_empty() {
        return Err(DafuError::invalid_parameter(
            "contamination_levels",
            "[]",
            "at least one level is required",
        ));
    }
    for (i, &level) in levels.iter().enumerate() {
        if !(level > 0.0 && level < 1.0) {
            return Err(DafuError::invalid_parameter(
                "contamination",
                level,
                "must be in (0, 1)",
            ));
        }
        if levels[..i].iter().any(|&seen| same_level(seen, level)) {
            return Err(DafuError::invalid_parameter(
                "contamination",
                level,
                "contamination levels must be unique",
            ));
        }
    }
    Ok(())
}
