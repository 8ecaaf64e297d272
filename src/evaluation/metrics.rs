//! Supervised metrics for anomaly verdicts

use super::labels::BinaryLabels;
use crate::error::{DafuError, Result};
use crate::policy::PredictionResult;
use serde::{Deserialize, Serialize};

/// Confusion counts with the anomaly class as positive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_pairs(truth: &[bool], predicted: &[bool]) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
                (true, true) => cm.tp += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// Metrics of one ensemble member against ground truth.
///
/// `precision`, `recall` and `f1` are support-weighted over both classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub n_samples: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
    /// Metrics of the anomaly class alone
    pub anomaly_class: ClassMetrics,
    /// Only when the label has exactly two distinct values
    pub roc_auc: Option<f64>,
}

/// Compare verdicts with labels; ROC-AUC ranks rows by risk score
pub fn evaluate(predictions: &[PredictionResult], labels: &BinaryLabels) -> Result<EvaluationReport> {
    if predictions.len() != labels.len() {
        return Err(DafuError::ShapeError {
            expected: format!("{} labels", predictions.len()),
            actual: format!("{} labels", labels.len()),
        });
    }
    if predictions.is_empty() {
        return Err(DafuError::DataError("cannot evaluate an empty batch".to_string()));
    }

    let predicted: Vec<bool> = predictions.iter().map(|p| p.verdict).collect();
    let cm = ConfusionMatrix::from_pairs(&labels.values, &predicted);
    let n = cm.total();

    let anomaly_class = ClassMetrics::new(cm.tp, cm.fp, cm.fn_);
    let normal_class = ClassMetrics::new(cm.tn, cm.fn_, cm.fp);
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        (f(&anomaly_class) * anomaly_class.support as f64
            + f(&normal_class) * normal_class.support as f64)
            / n as f64
    };

    let roc_auc = if labels.n_distinct == 2 {
        let risks: Vec<f64> = predictions.iter().map(|p| p.risk_score).collect();
        roc_auc(&labels.values, &risks)
    } else {
        None
    };

    Ok(EvaluationReport {
        n_samples: n,
        accuracy: ratio(cm.tp + cm.tn, n),
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1: weighted(|m| m.f1),
        confusion: cm,
        anomaly_class,
        roc_auc,
    })
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged.
///
/// `None` unless both classes are present.
pub fn roc_auc(truth: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = truth.iter().filter(|&&t| t).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block shares the mean rank
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(&t, _)| t)
        .map(|(_, &r)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(verdict: bool, risk: f64) -> PredictionResult {
        PredictionResult {
            raw_score: if verdict { -0.1 } else { 0.1 },
            risk_score: risk,
            verdict,
            contamination_used: 0.1,
        }
    }

    #[test]
    fn test_confusion_and_weighted_metrics() {
        let preds = vec![
            result(true, 0.9),
            result(true, 0.8),
            result(false, 0.2),
            result(false, 0.1),
            result(true, 0.7),
        ];
        let labels = BinaryLabels::from_bools(vec![true, false, false, false, true]);
        let report = evaluate(&preds, &labels).unwrap();

        assert_eq!(
            report.confusion,
            ConfusionMatrix { tn: 2, fp: 1, fn_: 0, tp: 2 }
        );
        assert!((report.accuracy - 0.8).abs() < 1e-12);
        assert!((report.anomaly_class.recall - 1.0).abs() < 1e-12);
        assert!((report.anomaly_class.precision - 2.0 / 3.0).abs() < 1e-12);
        // normal: precision 1.0, recall 2/3, f1 0.8; anomaly f1 0.8
        assert!((report.f1 - 0.8).abs() < 1e-12);
        assert_eq!(report.roc_auc, Some(5.0 / 6.0));
    }

    #[test]
    fn test_roc_auc_perfect_and_tied() {
        assert_eq!(roc_auc(&[false, false, true, true], &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&[false, true], &[0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&[false, false], &[0.1, 0.2]), None);
    }

    #[test]
    fn test_roc_auc_requires_two_label_values() {
        let preds = vec![result(false, 0.1), result(false, 0.2)];
        let labels = BinaryLabels::from_bools(vec![false, false]);
        let report = evaluate(&preds, &labels).unwrap();
        assert!(report.roc_auc.is_none());
    }

    #[test]
    fn test_length_mismatch() {
        let preds = vec![result(false, 0.1)];
        let labels = BinaryLabels::from_bools(vec![false, true]);
        assert!(evaluate(&preds, &labels).is_err());
    }
}
