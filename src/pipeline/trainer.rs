//! Training orchestration: profile, preprocess, train, evaluate, package

use super::config::PipelineConfig;
use crate::ensemble::{same_level, EnsembleTrainer};
use crate::error::{DafuError, Result};
use crate::evaluation::{evaluate, select_best, BinaryLabels, ContaminationEvaluation};
use crate::export::{Hyperparameters, PipelineArtifact, TrainingSummary};
use crate::policy::{score_rows, BatchSummary, PredictionResult};
use crate::preprocessing::Preprocessor;
use crate::profiling::{analyze, DataAnalysis, SchemaProfiler};
use crate::utils::columns::series;
use ndarray::Axis;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Predictions of one ensemble member on the training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPredictions {
    pub contamination: f64,
    pub results: Vec<PredictionResult>,
    pub summary: BatchSummary,
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub artifact: PipelineArtifact,
    pub analysis: DataAnalysis,
    pub member_predictions: Vec<MemberPredictions>,
    pub evaluations: Vec<ContaminationEvaluation>,
    pub best_contamination: Option<f64>,
    pub warnings: Vec<String>,
}

impl TrainingReport {
    /// Training-data predictions of the member at `contamination`
    pub fn predictions_for(&self, contamination: f64) -> Option<&MemberPredictions> {
        self.member_predictions
            .iter()
            .find(|m| same_level(m.contamination, contamination))
    }

    pub fn evaluation_for(&self, contamination: f64) -> Option<&ContaminationEvaluation> {
        self.evaluations
            .iter()
            .find(|e| same_level(e.contamination, contamination))
    }
}

/// Runs a full training job for one configuration
#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Train on a dataset and package the result as an artifact.
    ///
    /// Configuration, profiling and preprocessing problems are reported before
    /// any model is fit.
    pub fn run(&self, df: &DataFrame) -> Result<TrainingReport> {
        let start = Instant::now();
        let config = &self.config;
        config.validate()?;
        let levels = config.effective_contamination_levels();

        info!(
            rows = df.height(),
            columns = df.width(),
            label = ?config.label_column,
            policy = %config.detection_policy,
            "Starting training pipeline"
        );

        let profile = SchemaProfiler::new()
            .with_high_cardinality_ratio(config.high_cardinality_ratio)
            .with_low_variance_threshold(config.low_variance_threshold)
            .profile(df, config.label_column.as_deref())?;

        let analysis = analyze(df, &profile)?;
        let mut warnings = analysis
            .suitability
            .enforce(config.allow_insufficient_data)?;

        let labels = match config.label_column.as_deref() {
            Some(label) => Some(BinaryLabels::from_series(series(df, label)?)?),
            None => None,
        };

        let preprocessing = Preprocessor::new().fit(df, &profile)?;
        let features = preprocessing.apply(df)?;
        if features.n_features() == 0 {
            return Err(DafuError::InsufficientData {
                reasons: vec!["no feature columns remain after dropping".to_string()],
            });
        }

        let fit_rows = match (&labels, config.use_labels_for_training) {
            (Some(labels), true) => {
                let normal: Vec<usize> = (0..labels.len()).filter(|&i| !labels.values[i]).collect();
                if normal.is_empty() {
                    return Err(DafuError::InsufficientData {
                        reasons: vec!["no rows labelled normal to train on".to_string()],
                    });
                }
                info!(
                    normal_rows = normal.len(),
                    excluded = labels.len() - normal.len(),
                    "Semi-supervised mode: fitting on rows labelled normal"
                );
                features.values.select(Axis(0), &normal)
            }
            _ => features.values.clone(),
        };

        let ensemble = EnsembleTrainer::new(config.ensemble.clone()).train_with_reference(
            &fit_rows,
            &features.values,
            &levels,
        )?;

        let mut member_predictions = Vec::with_capacity(ensemble.len());
        for member in ensemble.members() {
            let raw = member.raw_scores(&features.values)?;
            let (results, degenerate) = score_rows(
                &config.detection_policy,
                &raw.to_vec(),
                member.min_score,
                member.max_score,
                member.contamination,
            );
            if let Some(message) = degenerate {
                warnings.push(format!("contamination {}: {}", member.contamination, message));
            }
            member_predictions.push(MemberPredictions {
                contamination: member.contamination,
                summary: BatchSummary::from_results(&results),
                results,
            });
        }

        let mut evaluations = Vec::new();
        if let Some(labels) = &labels {
            for member in &member_predictions {
                let report = evaluate(&member.results, labels)?;
                info!(
                    contamination = member.contamination,
                    accuracy = report.accuracy,
                    f1 = report.f1,
                    roc_auc = ?report.roc_auc,
                    "Evaluated ensemble member"
                );
                evaluations.push(ContaminationEvaluation {
                    contamination: member.contamination,
                    report,
                });
            }
        }
        let best_contamination = select_best(&evaluations).map(|e| e.contamination);
        if let Some(best) = best_contamination {
            info!(contamination = best, "Best contamination level by F1");
        }

        let training = TrainingSummary {
            n_rows: df.height(),
            n_fit_rows: fit_rows.nrows(),
            n_features: features.n_features(),
            evaluations: evaluations.clone(),
            best_contamination,
        };
        let hyperparameters = Hyperparameters {
            ensemble: config.ensemble.clone(),
            contamination_levels: levels,
            use_labels_for_training: config.use_labels_for_training,
        };
        let artifact = PipelineArtifact::new(
            profile,
            preprocessing,
            ensemble,
            config.detection_policy,
            hyperparameters,
            training,
        );

        for w in &warnings {
            warn!(warning = %w, "Training completed with warning");
        }
        info!(
            artifact_id = %artifact.artifact_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training pipeline complete"
        );

        Ok(TrainingReport {
            artifact,
            analysis,
            member_predictions,
            evaluations,
            best_contamination,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::EnsembleParams;

    fn labelled_frame(n: usize) -> DataFrame {
        let amount: Vec<f64> = (0..n)
            .map(|i| if i % 20 == 0 { 500.0 + i as f64 } else { 20.0 + ((i * 13) % 40) as f64 })
            .collect();
        let velocity: Vec<f64> = (0..n)
            .map(|i| if i % 20 == 0 { 30.0 } else { ((i * 7) % 5) as f64 })
            .collect();
        let label: Vec<i64> = (0..n).map(|i| (i % 20 == 0) as i64).collect();
        let ids: Vec<i64> = (0..n as i64).collect();
        df!("id" => &ids, "amount" => &amount, "velocity" => &velocity, "is_fraud" => &label)
            .unwrap()
    }

    fn quick(config: PipelineConfig) -> PipelineConfig {
        config.with_ensemble(EnsembleParams {
            n_estimators: 30,
            ..Default::default()
        })
    }

    #[test]
    fn test_label_is_never_a_feature() {
        let config = quick(PipelineConfig::new().with_label_column("is_fraud"));
        let report = TrainingPipeline::new(config).run(&labelled_frame(200)).unwrap();

        let features = report.artifact.preprocessing.feature_columns();
        assert_eq!(features, vec!["amount", "velocity"]);
        assert!(report.artifact.schema.primary_keys.contains("id"));
        assert_eq!(report.evaluations.len(), 3);
        assert!(report.best_contamination.is_some());
    }

    #[test]
    fn test_insufficient_data_gate() {
        let config = quick(PipelineConfig::new());
        let err = TrainingPipeline::new(config.clone())
            .run(&labelled_frame(40))
            .unwrap_err();
        assert!(matches!(err, DafuError::InsufficientData { .. }));

        let report = TrainingPipeline::new(config.with_allow_insufficient_data(true))
            .run(&labelled_frame(40))
            .unwrap();
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn test_semi_supervised_fits_on_normal_rows() {
        let config = quick(
            PipelineConfig::new()
                .with_label_column("is_fraud")
                .with_labels_for_training(true),
        );
        let report = TrainingPipeline::new(config).run(&labelled_frame(200)).unwrap();

        assert_eq!(report.artifact.training.n_rows, 200);
        assert_eq!(report.artifact.training.n_fit_rows, 190);
    }

    #[test]
    fn test_invalid_config_fails_before_work() {
        let config = PipelineConfig::new().with_contamination_levels(vec![0.5, 1.2]);
        let err = TrainingPipeline::new(config).run(&labelled_frame(200)).unwrap_err();
        assert!(matches!(err, DafuError::InvalidParameter { .. }));
    }
}
