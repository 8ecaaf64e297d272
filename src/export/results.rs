//! Prediction and training result export

use crate::error::{DafuError, Result};
use crate::pipeline::TrainingReport;
use crate::policy::PredictionResult;
use crate::utils::DataSaver;
use chrono::Local;
use polars::prelude::*;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Extension appended to artifact names that have none
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "dafu";

/// Columns appended to exported prediction files
pub const PREDICTION_COLUMNS: [&str; 5] = [
    "anomaly_prediction",
    "raw_score",
    "risk_score",
    "is_fraud",
    "contamination",
];

/// Files written by [`export_training_results`]
#[derive(Debug, Clone, Default)]
pub struct ExportedFiles {
    pub predictions: Vec<PathBuf>,
    pub metrics: Option<PathBuf>,
    pub configuration: PathBuf,
}

/// Append the default extension to a bare artifact name
pub fn resolve_artifact_path(name: impl AsRef<Path>) -> PathBuf {
    let path = name.as_ref();
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(DEFAULT_ARTIFACT_EXTENSION)
    }
}

/// Original rows with prediction columns appended
pub fn predictions_frame(batch: &DataFrame, results: &[PredictionResult]) -> Result<DataFrame> {
    if batch.height() != results.len() {
        return Err(DafuError::ShapeError {
            expected: format!("{} predictions", batch.height()),
            actual: format!("{} predictions", results.len()),
        });
    }

    for name in PREDICTION_COLUMNS {
        if batch.column(name).is_ok() {
            warn!(column = name, "Input column replaced by prediction output");
        }
    }

    let prediction: Vec<i32> = results.iter().map(|r| if r.verdict { -1 } else { 1 }).collect();
    let raw: Vec<f64> = results.iter().map(|r| r.raw_score).collect();
    let risk: Vec<f64> = results.iter().map(|r| r.risk_score).collect();
    let flag: Vec<i32> = results.iter().map(|r| r.verdict as i32).collect();
    let contamination: Vec<f64> = results.iter().map(|r| r.contamination_used).collect();

    let mut out = batch.clone();
    out.with_column(Series::new(PREDICTION_COLUMNS[0].into(), prediction))?;
    out.with_column(Series::new(PREDICTION_COLUMNS[1].into(), raw))?;
    out.with_column(Series::new(PREDICTION_COLUMNS[2].into(), risk))?;
    out.with_column(Series::new(PREDICTION_COLUMNS[3].into(), flag))?;
    out.with_column(Series::new(PREDICTION_COLUMNS[4].into(), contamination))?;
    Ok(out)
}

/// Write a scored batch to CSV
pub fn write_predictions_csv(
    batch: &DataFrame,
    results: &[PredictionResult],
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let mut out = predictions_frame(batch, results)?;
    DataSaver::save_csv(&mut out, path)?;
    info!(path = %path.display(), rows = out.height(), "Predictions exported");
    Ok(())
}

/// Write per-contamination predictions, metrics and run configuration to `dir`.
///
/// File names carry a `%Y%m%d_%H%M%S` timestamp.
pub fn export_training_results(
    dir: impl AsRef<Path>,
    data: &DataFrame,
    report: &TrainingReport,
) -> Result<ExportedFiles> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let mut files = ExportedFiles::default();

    for member in &report.member_predictions {
        let path = dir.join(format!(
            "fraud_predictions_contamination_{}_{}.csv",
            member.contamination, timestamp
        ));
        write_predictions_csv(data, &member.results, &path)?;
        files.predictions.push(path);
    }

    if !report.evaluations.is_empty() {
        let evals = &report.evaluations;
        let mut metrics = df!(
            "contamination" => evals.iter().map(|e| e.contamination).collect::<Vec<_>>(),
            "accuracy" => evals.iter().map(|e| e.report.accuracy).collect::<Vec<_>>(),
            "f1_score" => evals.iter().map(|e| e.report.f1).collect::<Vec<_>>(),
            "precision" => evals.iter().map(|e| e.report.precision).collect::<Vec<_>>(),
            "recall" => evals.iter().map(|e| e.report.recall).collect::<Vec<_>>(),
            "roc_auc" => evals.iter().map(|e| e.report.roc_auc).collect::<Vec<_>>(),
            "tn" => evals.iter().map(|e| e.report.confusion.tn as u64).collect::<Vec<_>>(),
            "fp" => evals.iter().map(|e| e.report.confusion.fp as u64).collect::<Vec<_>>(),
            "fn" => evals.iter().map(|e| e.report.confusion.fn_ as u64).collect::<Vec<_>>(),
            "tp" => evals.iter().map(|e| e.report.confusion.tp as u64).collect::<Vec<_>>(),
        )?;
        let path = dir.join(format!("evaluation_metrics_{}.csv", timestamp));
        DataSaver::save_csv(&mut metrics, &path)?;
        info!(path = %path.display(), "Metrics exported");
        files.metrics = Some(path);
    }

    let artifact = &report.artifact;
    let configuration = json!({
        "timestamp": timestamp,
        "artifact_id": artifact.artifact_id,
        "created_at": artifact.created_at,
        "data_shape": [data.height(), data.width()],
        "processed_shape": [artifact.training.n_rows, artifact.training.n_features],
        "is_supervised": artifact.schema.label_column.is_some(),
        "label_column": artifact.schema.label_column,
        "primary_keys": artifact.schema.primary_keys,
        "categorical_columns": artifact.schema.categorical_columns,
        "numerical_columns": artifact.schema.numerical_columns,
        "high_cardinality_columns": artifact.schema.high_cardinality_columns,
        "low_variance_columns": artifact.schema.low_variance_columns,
        "retained_columns": artifact.preprocessing.retained_columns,
        "contamination_levels": artifact.ensemble.contamination_levels(),
        "detection_policy": artifact.policy,
        "hyperparameters": artifact.hyperparameters,
        "best_contamination": artifact.training.best_contamination,
        "warnings": report.warnings,
    });
    let path = dir.join(format!("configuration_{}.json", timestamp));
    fs::write(&path, serde_json::to_string_pretty(&configuration)?)?;
    info!(path = %path.display(), "Configuration exported");
    files.configuration = path;

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_artifact_path() {
        assert_eq!(resolve_artifact_path("fraud_model"), PathBuf::from("fraud_model.dafu"));
        assert_eq!(resolve_artifact_path("fraud_model.bin"), PathBuf::from("fraud_model.bin"));
        assert_eq!(
            resolve_artifact_path("models/v2/latest"),
            PathBuf::from("models/v2/latest.dafu")
        );
    }

    #[test]
    fn test_predictions_frame_appends_columns() {
        let batch = df!("amount" => &[1.0, 2.0]).unwrap();
        let results = vec![
            PredictionResult {
                raw_score: -0.2,
                risk_score: 0.9,
                verdict: true,
                contamination_used: 0.1,
            },
            PredictionResult {
                raw_score: 0.1,
                risk_score: 0.2,
                verdict: false,
                contamination_used: 0.1,
            },
        ];
        let out = predictions_frame(&batch, &results).unwrap();
        assert_eq!(out.width(), 6);
        let flags: Vec<Option<i32>> = out.column("is_fraud").unwrap().i32().unwrap().into_iter().collect();
        assert_eq!(flags, vec![Some(1), Some(0)]);
    }

    #[test]
    fn test_predictions_frame_length_mismatch() {
        let batch = df!("amount" => &[1.0, 2.0]).unwrap();
        assert!(predictions_frame(&batch, &[]).is_err());
    }
}
