//! Persistence and export
//!
//! - [`PipelineArtifact`]: the versioned, checksummed unit loaded for inference
//! - CSV/JSON export of predictions and training results

mod artifact;
mod results;

pub use artifact::{
    Hyperparameters, PipelineArtifact, TrainingSummary, FORMAT_VERSION, MAGIC,
};
pub use results::{
    export_training_results, predictions_frame, resolve_artifact_path, write_predictions_csv,
    ExportedFiles, DEFAULT_ARTIFACT_EXTENSION, PREDICTION_COLUMNS,
};
