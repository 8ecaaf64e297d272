//! Schema profiling
//!
//! Classifies the columns of a training dataset (primary keys, categorical,
//! numerical, high-cardinality, low-variance) and produces a structured
//! suitability analysis.

mod analysis;
mod profiler;

pub use analysis::{
    analyze, DataAnalysis, LabelCount, LabelDistribution, MissingValues, SuitabilityIssue,
    SuitabilityReport, MIN_NUMERICAL_FEATURES, MIN_TRAINING_ROWS,
};
pub use profiler::{ColumnKind, ColumnProfile, SchemaProfile, SchemaProfiler};
