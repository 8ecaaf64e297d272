//! Supervised evaluation of ensemble members
//!
//! Labels are only ever used here and for semi-supervised row selection;
//! they never become model features.

mod labels;
mod metrics;

pub use labels::BinaryLabels;
pub use metrics::{evaluate, roc_auc, ClassMetrics, ConfusionMatrix, EvaluationReport};

use serde::{Deserialize, Serialize};

/// Evaluation of the member trained at one contamination level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminationEvaluation {
    pub contamination: f64,
    pub report: EvaluationReport,
}

/// Best member by F1; ties go to the lowest contamination
pub fn select_best(evaluations: &[ContaminationEvaluation]) -> Option<&ContaminationEvaluation> {
    evaluations.iter().reduce(|best, candidate| {
        let better = candidate.report.f1 > best.report.f1
            || (candidate.report.f1 == best.report.f1
                && candidate.contamination < best.contamination);
        if better {
            candidate
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(contamination: f64, f1: f64) -> ContaminationEvaluation {
        ContaminationEvaluation {
            contamination,
            report: EvaluationReport {
                n_samples: 10,
                accuracy: 0.9,
                precision: 0.9,
                recall: 0.9,
                f1,
                confusion: ConfusionMatrix::default(),
                anomaly_class: ClassMetrics {
                    precision: 0.5,
                    recall: 0.5,
                    f1: 0.5,
                    support: 1,
                },
                roc_auc: None,
            },
        }
    }

    #[test]
    fn test_best_by_f1() {
        let evals = vec![eval(0.01, 0.7), eval(0.05, 0.9), eval(0.1, 0.8)];
        assert_eq!(select_best(&evals).unwrap().contamination, 0.05);
    }

    #[test]
    fn test_ties_prefer_lowest_contamination() {
        let evals = vec![eval(0.1, 0.9), eval(0.01, 0.9), eval(0.05, 0.9)];
        assert_eq!(select_best(&evals).unwrap().contamination, 0.01);
        assert!(select_best(&[]).is_none());
    }
}
