//! Training pipeline
//!
//! [`PipelineConfig`] describes a run, [`TrainingPipeline`] executes it and
//! the [`job`] functions wrap both sides behind serialisable outcomes.

mod config;
pub mod job;
mod trainer;

pub use config::{PipelineConfig, DEFAULT_CLASSIC_LEVELS, DEFAULT_RISK_LEVEL};
pub use job::{run_scoring_job, run_training_job, JobError, JobOutcome, JobStatus, ResultPayload};
pub use trainer::{MemberPredictions, TrainingPipeline, TrainingReport};
