//! Stream inference engine
//!
//! Scores batches against a loaded, read-only pipeline artifact:
//! - Preprocessing is replayed in apply mode, never refit
//! - Unseen categories degrade to the fallback index with a warning
//! - Missing columns fail the batch without touching the artifact
//! - Counters are atomic so `predict` can run from many threads

use super::InferenceConfig;
use crate::ensemble::EnsembleMember;
use crate::error::{DafuError, Result};
use crate::export::PipelineArtifact;
use crate::policy::{score_rows, BatchSummary, PredictionResult};
use crate::preprocessing::UnknownCategoryWarning;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Uninitialized,
    /// Artifact loaded, schema compatibility not yet proven
    Loaded,
    /// At least one batch passed preprocessing
    Ready,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineState::Loaded,
            2 => EngineState::Ready,
            _ => EngineState::Uninitialized,
        }
    }
}

/// Scored batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    pub results: Vec<PredictionResult>,
    pub summary: BatchSummary,
    pub contamination_used: f64,
    pub unknown_categories: Vec<UnknownCategoryWarning>,
    /// Human-readable warnings (unseen categories, degenerate score range)
    pub warnings: Vec<String>,
}

impl BatchPrediction {
    pub fn raw_scores(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.raw_score).collect()
    }

    pub fn risk_scores(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.risk_score).collect()
    }

    pub fn verdicts(&self) -> Vec<bool> {
        self.results.iter().map(|r| r.verdict).collect()
    }
}

/// Inference statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub batches_scored: u64,
    pub rows_scored: u64,
    pub anomalies_flagged: u64,
    pub failed_batches: u64,
    pub total_latency_ms: f64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Default)]
struct Counters {
    batches: AtomicU64,
    rows: AtomicU64,
    anomalies: AtomicU64,
    failed: AtomicU64,
    latency_us: AtomicU64,
}

/// Scores new batches with a loaded pipeline artifact
#[derive(Debug)]
pub struct StreamInferenceEngine {
    config: InferenceConfig,
    artifact: Option<Arc<PipelineArtifact>>,
    state: AtomicU8,
    counters: Counters,
}

impl StreamInferenceEngine {
    /// Create an engine with no artifact
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            artifact: None,
            state: AtomicU8::new(EngineState::Uninitialized as u8),
            counters: Counters::default(),
        }
    }

    /// Create an engine around an in-memory artifact
    pub fn from_artifact(config: InferenceConfig, artifact: PipelineArtifact) -> Self {
        let mut engine = Self::new(config);
        engine.set_artifact(Arc::new(artifact));
        engine
    }

    /// Load an artifact file
    pub fn load(config: InferenceConfig, path: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        let artifact = PipelineArtifact::load(path)?;
        Ok(Self::from_artifact(config, artifact))
    }

    /// Replace the loaded artifact; the engine returns to `Loaded`
    pub fn set_artifact(&mut self, artifact: Arc<PipelineArtifact>) {
        info!(
            artifact_id = %artifact.artifact_id,
            levels = ?artifact.ensemble.contamination_levels(),
            policy = %artifact.policy,
            "Artifact attached to inference engine"
        );
        self.artifact = Some(artifact);
        self.state.store(EngineState::Loaded as u8, Ordering::SeqCst);
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn artifact(&self) -> Option<&PipelineArtifact> {
        self.artifact.as_deref()
    }

    fn loaded(&self) -> Result<&PipelineArtifact> {
        self.artifact.as_deref().ok_or(DafuError::EngineNotLoaded)
    }

    /// Member for a requested level, else the configured default, else the first
    fn select_member<'a>(
        &self,
        artifact: &'a PipelineArtifact,
        contamination: Option<f64>,
    ) -> Result<&'a EnsembleMember> {
        match contamination.or(self.config.default_contamination) {
            Some(level) => artifact.ensemble.get(level).ok_or_else(|| {
                DafuError::invalid_parameter(
                    "contamination",
                    level,
                    format!(
                        "no model trained at this level (available: {:?})",
                        artifact.ensemble.contamination_levels()
                    ),
                )
            }),
            None => artifact.ensemble.first().ok_or_else(|| {
                DafuError::CorruptArtifact("artifact contains no ensemble members".to_string())
            }),
        }
    }

    /// Prove a batch is schema-compatible without scoring it
    pub fn warmup(&self, batch: &DataFrame) -> Result<()> {
        let artifact = self.loaded()?;
        artifact.preprocessing.apply(batch)?;
        self.mark_ready();
        Ok(())
    }

    fn mark_ready(&self) {
        let _ = self.state.compare_exchange(
            EngineState::Loaded as u8,
            EngineState::Ready as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Score a batch.
    ///
    /// `contamination` picks the ensemble member; `None` uses the default member.
    /// A label column in the batch is ignored.
    pub fn predict(&self, batch: &DataFrame, contamination: Option<f64>) -> Result<BatchPrediction> {
        let start = Instant::now();
        let result = self.score(batch, contamination);

        match &result {
            Ok(prediction) => {
                let c = &self.counters;
                c.batches.fetch_add(1, Ordering::Relaxed);
                c.rows.fetch_add(prediction.summary.total as u64, Ordering::Relaxed);
                c.anomalies
                    .fetch_add(prediction.summary.anomalies as u64, Ordering::Relaxed);
                c.latency_us
                    .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
                debug!(
                    rows = prediction.summary.total,
                    anomalies = prediction.summary.anomalies,
                    contamination = prediction.contamination_used,
                    "Batch scored"
                );
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, rows = batch.height(), "Batch scoring failed");
            }
        }
        result
    }

    fn score(&self, batch: &DataFrame, contamination: Option<f64>) -> Result<BatchPrediction> {
        let artifact = self.loaded()?;
        let member = self.select_member(artifact, contamination)?;

        if let Some(label) = artifact.preprocessing.label_column.as_deref() {
            if batch.column(label).is_ok() {
                debug!(column = label, "Label column present in batch; ignored for scoring");
            }
        }

        let features = artifact.preprocessing.apply(batch)?;
        self.mark_ready();

        let raw = member.raw_scores(&features.values)?;
        let (results, degenerate) = score_rows(
            &artifact.policy,
            &raw.to_vec(),
            member.min_score,
            member.max_score,
            member.contamination,
        );

        let mut warnings: Vec<String> = features
            .unknown_categories
            .iter()
            .map(|w| {
                format!(
                    "column '{}': {} row(s) with unseen categories mapped to the most frequent category",
                    w.column, w.count
                )
            })
            .collect();
        warnings.extend(degenerate);

        Ok(BatchPrediction {
            summary: BatchSummary::from_results(&results),
            results,
            contamination_used: member.contamination,
            unknown_categories: features.unknown_categories,
            warnings,
        })
    }

    /// Score a large frame in chunks of `stream_chunk_size` rows
    pub fn predict_streaming<'a>(
        &'a self,
        df: &'a DataFrame,
        contamination: Option<f64>,
    ) -> Result<impl Iterator<Item = Result<BatchPrediction>> + 'a> {
        self.loaded()?;
        self.config.validate()?;

        let chunk_size = self.config.stream_chunk_size;
        let n_chunks = (df.height() + chunk_size - 1) / chunk_size;

        Ok((0..n_chunks).map(move |i| {
            let start = i * chunk_size;
            let end = (start + chunk_size).min(df.height());
            let chunk = df.slice(start as i64, end - start);
            self.predict(&chunk, contamination)
        }))
    }

    /// Statistics snapshot
    pub fn stats(&self) -> InferenceStats {
        let c = &self.counters;
        let batches = c.batches.load(Ordering::Relaxed);
        let total_latency_ms = c.latency_us.load(Ordering::Relaxed) as f64 / 1000.0;
        InferenceStats {
            batches_scored: batches,
            rows_scored: c.rows.load(Ordering::Relaxed),
            anomalies_flagged: c.anomalies.load(Ordering::Relaxed),
            failed_batches: c.failed.load(Ordering::Relaxed),
            total_latency_ms,
            avg_latency_ms: if batches == 0 {
                0.0
            } else {
                total_latency_ms / batches as f64
            },
        }
    }
}
