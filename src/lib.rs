//! DAFU - Tabular anomaly detection for fraud scoring
//!
//! This crate trains an ensemble of isolation forests over a profiled,
//! preprocessed dataset and packages everything needed to score new data
//! identically into a single versioned artifact:
//! - Schema profiling and dataset suitability analysis
//! - Train/serve consistent preprocessing (encoding, imputation, scaling)
//! - One detector per contamination level, with classic or risk-threshold decisions
//! - Evaluation against an optional ground-truth label
//! - Streaming inference over loaded artifacts
//!
//! # Modules
//!
//! ## Core
//! - [`profiling`] - Column classification and data analysis
//! - [`preprocessing`] - Fitted preprocessing state and sequence windows
//! - [`anomaly`] - Isolation forest and the detector trait
//! - [`ensemble`] - Per-contamination ensemble training
//! - [`policy`] - Decision policies and risk scores
//! - [`evaluation`] - Metrics against binary labels
//!
//! ## Persistence and serving
//! - [`export`] - Pipeline artifact and result export
//! - [`inference`] - Stream inference engine
//! - [`pipeline`] - Configuration, training orchestration, job boundary
//!
//! ## Interfaces
//! - [`cli`] - Command-line interface
//! - [`utils`] - Dataset loading

// Core error handling
pub mod error;

// Core modules
pub mod profiling;
pub mod preprocessing;
pub mod anomaly;
pub mod ensemble;
pub mod policy;
pub mod evaluation;

// Persistence and serving
pub mod export;
pub mod inference;
pub mod pipeline;

// Interfaces
pub mod utils;
pub mod cli;

pub use error::{DafuError, ErrorKind, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{DafuError, ErrorKind, Result};

    // Profiling
    pub use crate::profiling::{analyze, DataAnalysis, SchemaProfile, SchemaProfiler};

    // Preprocessing
    pub use crate::preprocessing::{
        FeatureMatrix, PreprocessingState, Preprocessor, SequenceWindows, UnknownCategoryWarning,
    };

    // Detection
    pub use crate::anomaly::{AnomalyDetector, IsolationForest, IsolationForestParams, MaxSamples};
    pub use crate::ensemble::{EnsembleModel, EnsembleParams, EnsembleTrainer};
    pub use crate::policy::{BatchSummary, DetectionPolicy, PredictionResult};

    // Evaluation
    pub use crate::evaluation::{evaluate, BinaryLabels, EvaluationReport};

    // Persistence
    pub use crate::export::{resolve_artifact_path, PipelineArtifact};

    // Inference
    pub use crate::inference::{BatchPrediction, InferenceConfig, StreamInferenceEngine};

    // Pipeline
    pub use crate::pipeline::{JobOutcome, PipelineConfig, TrainingPipeline, TrainingReport};

    // Data loading
    pub use crate::utils::DataLoader;
}
