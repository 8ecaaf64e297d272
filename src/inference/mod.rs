//! Inference engine module
//!
//! Loads a pipeline artifact and scores new batches with the exact
//! training-time preprocessing, either whole or in streaming chunks.

mod config;
mod engine;

pub use config::InferenceConfig;
pub use engine::{BatchPrediction, EngineState, InferenceStats, StreamInferenceEngine};
