//! Data preprocessing module
//!
//! Reproducible feature transformation shared by every model family:
//! - Median imputation for numerical columns, mode imputation for categorical ones
//! - Frequency-ordered category encoding with a fallback for unseen values
//! - Standard scaling with parameters captured at fit time
//! - Sliding windows for sequence models

mod encoder;
mod imputer;
mod pipeline;
mod scaler;
mod sequence;

pub use encoder::{CategoryEncoder, Encoded, FALLBACK_INDEX};
pub use imputer::MedianImputer;
pub use pipeline::{
    FeatureColumn, FeatureMatrix, FeatureTransform, PreprocessingState, Preprocessor,
    UnknownCategoryWarning,
};
pub use scaler::StandardScaler;
pub use sequence::SequenceWindows;
