//! Trained ensemble keyed by contamination level

use crate::anomaly::{AnomalyDetector, IsolationForest};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Tolerance when matching a requested contamination level to a member
const LEVEL_EPSILON: f64 = 1e-9;

/// Whether two contamination levels name the same ensemble member
pub fn same_level(a: f64, b: f64) -> bool {
    (a - b).abs() < LEVEL_EPSILON
}

/// One trained detector plus its training-time score range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMember {
    pub contamination: f64,
    pub detector: IsolationForest,
    /// Lowest decision score observed on the training matrix
    pub min_score: f64,
    /// Highest decision score observed on the training matrix
    pub max_score: f64,
}

impl EnsembleMember {
    /// Decision scores, negative means anomalous
    pub fn raw_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.detector.decision_function(x)
    }

    /// Rows with a negative decision score
    pub fn flagged(&self, x: &Array2<f64>) -> Result<usize> {
        Ok(self.raw_scores(x)?.iter().filter(|&&s| s < 0.0).count())
    }

    /// True when every training row scored the same
    pub fn has_degenerate_range(&self) -> bool {
        self.max_score <= self.min_score
    }
}

/// Detectors fit on the identical feature matrix, one per unique contamination level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleModel {
    members: Vec<EnsembleMember>,
    n_features: usize,
}

impl EnsembleModel {
    pub(crate) fn new(members: Vec<EnsembleMember>, n_features: usize) -> Self {
        Self {
            members,
            n_features,
        }
    }

    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Levels in training order
    pub fn contamination_levels(&self) -> Vec<f64> {
        self.members.iter().map(|m| m.contamination).collect()
    }

    /// Member trained at `contamination`
    pub fn get(&self, contamination: f64) -> Option<&EnsembleMember> {
        self.members
            .iter()
            .find(|m| same_level(m.contamination, contamination))
    }

    /// Default member used when no level is requested
    pub fn first(&self) -> Option<&EnsembleMember> {
        self.members.first()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
