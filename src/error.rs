//! Error types for the DAFU anomaly detection core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for DAFU operations
pub type Result<T> = std::result::Result<T, DafuError>;

/// Main error type for the fraud scoring pipeline
#[derive(Error, Debug)]
pub enum DafuError {
    #[error("Schema mismatch: required columns missing from batch: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Insufficient data for anomaly detection: {}", reasons.join("; "))]
    InsufficientData { reasons: Vec<String> },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Artifact not found at {path}: {reason}")]
    ArtifactNotFound { path: String, reason: String },

    #[error("Artifact format version {found} is incompatible with supported version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    #[error("Inference engine has no artifact loaded")]
    EngineNotLoaded,

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

/// Stable, serialisable error code handed across the job boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaMismatch,
    InsufficientData,
    InvalidParameter,
    ArtifactNotFound,
    VersionMismatch,
    CorruptArtifact,
    EngineNotLoaded,
    Data,
    Serialization,
    Io,
    Shape,
}

impl DafuError {
    /// Shorthand for an [`DafuError::InvalidParameter`]
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        DafuError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Error code of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DafuError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            DafuError::InsufficientData { .. } => ErrorKind::InsufficientData,
            DafuError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            DafuError::ArtifactNotFound { .. } => ErrorKind::ArtifactNotFound,
            DafuError::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            DafuError::CorruptArtifact(_) => ErrorKind::CorruptArtifact,
            DafuError::EngineNotLoaded => ErrorKind::EngineNotLoaded,
            DafuError::DataError(_) => ErrorKind::Data,
            DafuError::SerializationError(_) => ErrorKind::Serialization,
            DafuError::IoError(_) => ErrorKind::Io,
            DafuError::ShapeError { .. } => ErrorKind::Shape,
        }
    }
}

impl From<polars::error::PolarsError> for DafuError {
    fn from(err: polars::error::PolarsError) -> Self {
        DafuError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for DafuError {
    fn from(err: serde_json::Error) -> Self {
        DafuError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for DafuError {
    fn from(err: bincode::Error) -> Self {
        DafuError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DafuError {
    fn from(err: ndarray::ShapeError) -> Self {
        DafuError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_names_columns() {
        let err = DafuError::SchemaMismatch {
            missing: vec!["amount".to_string(), "merchant".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Schema mismatch: required columns missing from batch: amount, merchant"
        );
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DafuError = io_err.into();
        assert!(matches!(err, DafuError::IoError(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::VersionMismatch).unwrap();
        assert_eq!(json, "\"version_mismatch\"");
    }
}
