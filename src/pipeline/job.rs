//! Job boundary for callers that persist opaque result records
//!
//! Every outcome, success or failure, is a plain serialisable value.

use super::config::PipelineConfig;
use super::trainer::TrainingPipeline;
use crate::error::{DafuError, ErrorKind, Result};
use crate::evaluation::ContaminationEvaluation;
use crate::inference::{BatchPrediction, StreamInferenceEngine};
use crate::policy::BatchSummary;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failure,
}

/// Typed failure reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&DafuError> for JobError {
    fn from(e: &DafuError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub contamination: f64,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultPayload {
    Training {
        artifact_id: String,
        artifact_path: Option<String>,
        n_rows: usize,
        n_features: usize,
        members: Vec<MemberSummary>,
        evaluations: Vec<ContaminationEvaluation>,
        best_contamination: Option<f64>,
        warnings: Vec<String>,
    },
    Scoring {
        prediction: BatchPrediction,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub result: Option<ResultPayload>,
    pub error: Option<JobError>,
}

impl JobOutcome {
    pub fn success(result: ResultPayload) -> Self {
        Self {
            status: JobStatus::Success,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(e: &DafuError) -> Self {
        Self {
            status: JobStatus::Failure,
            result: None,
            error: Some(JobError::from(e)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn from_result(job: &str, result: Result<ResultPayload>) -> Self {
        match result {
            Ok(payload) => {
                info!(job, "Job succeeded");
                Self::success(payload)
            }
            Err(e) => {
                error!(job, kind = ?e.kind(), error = %e, "Job failed");
                Self::failure(&e)
            }
        }
    }
}

/// Train on `df` and optionally save the artifact to `artifact_path`
pub fn run_training_job(
    df: &DataFrame,
    config: &PipelineConfig,
    artifact_path: Option<&Path>,
) -> JobOutcome {
    JobOutcome::from_result("training", train_payload(df, config, artifact_path))
}

fn train_payload(
    df: &DataFrame,
    config: &PipelineConfig,
    artifact_path: Option<&Path>,
) -> Result<ResultPayload> {
    let report = TrainingPipeline::new(config.clone()).run(df)?;
    if let Some(path) = artifact_path {
        report.artifact.save(path)?;
    }
    Ok(ResultPayload::Training {
        artifact_id: report.artifact.artifact_id.to_string(),
        artifact_path: artifact_path.map(|p| p.display().to_string()),
        n_rows: report.artifact.training.n_rows,
        n_features: report.artifact.training.n_features,
        members: report
            .member_predictions
            .iter()
            .map(|m| MemberSummary {
                contamination: m.contamination,
                summary: m.summary,
            })
            .collect(),
        evaluations: report.evaluations,
        best_contamination: report.best_contamination,
        warnings: report.warnings,
    })
}

/// Score one batch with an already loaded engine
pub fn run_scoring_job(
    engine: &StreamInferenceEngine,
    batch: &DataFrame,
    contamination: Option<f64>,
) -> JobOutcome {
    let result = engine
        .predict(batch, contamination)
        .map(|prediction| ResultPayload::Scoring { prediction });
    JobOutcome::from_result("scoring", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::EnsembleParams;
    use crate::inference::InferenceConfig;

    fn frame(n: usize) -> DataFrame {
        let a: Vec<f64> = (0..n).map(|i| ((i * 17) % 31) as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 5) % 11) as f64 * 0.5).collect();
        df!("a" => &a, "b" => &b).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new().with_ensemble(EnsembleParams {
            n_estimators: 20,
            ..Default::default()
        })
    }

    #[test]
    fn test_training_job_success_json() {
        let outcome = run_training_job(&frame(150), &config(), None);
        assert!(outcome.is_success());

        let json: serde_json::Value = serde_json::from_str(&outcome.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["result"]["type"], "training");
        assert_eq!(json["result"]["members"].as_array().unwrap().len(), 3);
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_training_job_failure_is_typed() {
        let outcome = run_training_job(&frame(20), &config(), None);
        assert_eq!(outcome.status, JobStatus::Failure);
        assert!(outcome.result.is_none());
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::InsufficientData);
    }

    #[test]
    fn test_scoring_job_reports_schema_mismatch() {
        let report = TrainingPipeline::new(config()).run(&frame(150)).unwrap();
        let engine = StreamInferenceEngine::from_artifact(InferenceConfig::new(), report.artifact);

        let ok = run_scoring_job(&engine, &frame(10), None);
        assert!(ok.is_success());

        let batch = df!("a" => &[1.0, 2.0]).unwrap();
        let failed = run_scoring_job(&engine, &batch, None);
        let error = failed.error.unwrap();
        assert_eq!(error.kind, ErrorKind::SchemaMismatch);
        assert!(error.message.contains('b'));
    }
}
