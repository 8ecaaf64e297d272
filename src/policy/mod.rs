//! Decision policies
//!
//! Turn raw decision scores into binary verdicts. `Classic` follows the
//! detector's sign convention; `RiskThreshold` compares the normalized risk
//! score against a fixed threshold. The risk score itself is always computed.

use crate::error::{DafuError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Active verdict rule of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DetectionPolicy {
    /// Anomalous iff the raw decision score is negative
    Classic,
    /// Anomalous iff the risk score is at least `threshold`
    RiskThreshold { threshold: f64 },
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        DetectionPolicy::Classic
    }
}

impl fmt::Display for DetectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionPolicy::Classic => write!(f, "classic"),
            DetectionPolicy::RiskThreshold { threshold } => write!(f, "risk-threshold({})", threshold),
        }
    }
}

impl DetectionPolicy {
    /// Risk threshold policy, rejecting thresholds outside [0, 1]
    pub fn risk_threshold(threshold: f64) -> Result<Self> {
        let policy = DetectionPolicy::RiskThreshold { threshold };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            DetectionPolicy::Classic => Ok(()),
            DetectionPolicy::RiskThreshold { threshold } => {
                if (0.0..=1.0).contains(&threshold) {
                    Ok(())
                } else {
                    Err(DafuError::invalid_parameter(
                        "risk_threshold",
                        threshold,
                        "must be in [0, 1]",
                    ))
                }
            }
        }
    }

    /// Verdict for one row given both of its scores
    pub fn verdict(&self, raw_score: f64, risk_score: f64) -> bool {
        match *self {
            DetectionPolicy::Classic => classic_verdict(raw_score),
            DetectionPolicy::RiskThreshold { threshold } => risk_verdict(risk_score, threshold),
        }
    }
}

/// True iff the raw decision score falls on the anomaly side
pub fn classic_verdict(raw_score: f64) -> bool {
    raw_score < 0.0
}

/// Min-max normalized risk in [0, 1], 1.0 being most anomalous.
///
/// Scores outside the training range are clamped. A degenerate range
/// (`max_score <= min_score`) yields 0.0.
pub fn risk_score(raw_score: f64, min_score: f64, max_score: f64) -> f64 {
    let range = max_score - min_score;
    if !(range > 0.0) {
        return 0.0;
    }
    ((max_score - raw_score) / range).clamp(0.0, 1.0)
}

/// True iff the risk score reaches the threshold
pub fn risk_verdict(risk_score: f64, threshold: f64) -> bool {
    risk_score >= threshold
}

/// Normalizes a batch of raw scores against one member's training range.
///
/// Returns the risk scores and, for a degenerate range, a warning message.
pub fn risk_scores(raw_scores: &[f64], min_score: f64, max_score: f64) -> (Vec<f64>, Option<String>) {
    let warning = if max_score <= min_score {
        let message = format!(
            "degenerate training score range [{}, {}]; risk scores set to 0.0",
            min_score, max_score
        );
        warn!(min_score, max_score, "Degenerate training score range");
        Some(message)
    } else {
        None
    };

    let scores = raw_scores
        .iter()
        .map(|&s| risk_score(s, min_score, max_score))
        .collect();
    (scores, warning)
}

/// Scores and verdict for one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub raw_score: f64,
    /// Always present, whatever the active policy
    pub risk_score: f64,
    pub verdict: bool,
    pub contamination_used: f64,
}

/// Batch-level counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub anomalies: usize,
    pub anomaly_rate: f64,
}

impl BatchSummary {
    pub fn from_results(results: &[PredictionResult]) -> Self {
        let total = results.len();
        let anomalies = results.iter().filter(|r| r.verdict).count();
        Self {
            total,
            anomalies,
            anomaly_rate: if total == 0 {
                0.0
            } else {
                anomalies as f64 / total as f64
            },
        }
    }
}

/// Apply a policy to raw scores from the member trained at `contamination`
pub fn score_rows(
    policy: &DetectionPolicy,
    raw_scores: &[f64],
    min_score: f64,
    max_score: f64,
    contamination: f64,
) -> (Vec<PredictionResult>, Option<String>) {
    let (risks, warning) = risk_scores(raw_scores, min_score, max_score);
    let results = raw_scores
        .iter()
        .zip(risks)
        .map(|(&raw_score, risk_score)| PredictionResult {
            raw_score,
            risk_score,
            verdict: policy.verdict(raw_score, risk_score),
            contamination_used: contamination,
        })
        .collect();
    (results, warning)
}
