//! Anomaly detection models
//!
//! Scores follow the isolation-ensemble convention: `score_samples` is higher
//! for normal rows, and `decision_function` is negative for rows the model
//! considers anomalous.

mod isolation_forest;

pub use isolation_forest::{IsolationForest, IsolationForestParams, IsolationTree, MaxSamples};

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Label used by `predict` for anomalous rows
pub const ANOMALY: i32 = -1;
/// Label used by `predict` for normal rows
pub const NORMAL: i32 = 1;

/// Common interface for unsupervised anomaly detectors
pub trait AnomalyDetector: Send + Sync {
    /// Fit the detector on a feature matrix
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Raw normality scores, lower is more anomalous
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Scores shifted by the fitted offset; negative means anomalous
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// `-1` for anomalies, `1` for normal rows
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        Ok(self
            .decision_function(x)?
            .mapv(|d| if d < 0.0 { ANOMALY } else { NORMAL }))
    }

    fn is_fitted(&self) -> bool;
}
