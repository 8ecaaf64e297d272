//! Ensemble module
//!
//! Trains one anomaly detector per contamination level on a shared feature
//! matrix and keeps each member's training score range for risk normalization.

mod model;
mod trainer;

pub use model::{same_level, EnsembleMember, EnsembleModel};
pub use trainer::{validate_levels, EnsembleParams, EnsembleTrainer};
