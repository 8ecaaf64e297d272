//! Inference configuration

use crate::error::{DafuError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the stream inference engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Rows per chunk in `predict_streaming`
    pub stream_chunk_size: usize,

    /// Ensemble member used when a call does not name one.
    /// `None` selects the first trained level.
    pub default_contamination: Option<f64>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            stream_chunk_size: 10_000,
            default_contamination: None,
        }
    }
}

impl InferenceConfig {
    /// Create a new inference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the streaming chunk size
    pub fn with_streaming(mut self, chunk_size: usize) -> Self {
        self.stream_chunk_size = chunk_size;
        self
    }

    /// Builder method to set the default contamination level
    pub fn with_default_contamination(mut self, contamination: f64) -> Self {
        self.default_contamination = Some(contamination);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream_chunk_size == 0 {
            return Err(DafuError::invalid_parameter(
                "stream_chunk_size",
                0,
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.stream_chunk_size, 10_000);
        assert!(config.default_contamination.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = InferenceConfig::new()
            .with_streaming(500)
            .with_default_contamination(0.05);

        assert_eq!(config.stream_chunk_size, 500);
        assert_eq!(config.default_contamination, Some(0.05));
        assert!(InferenceConfig::new().with_streaming(0).validate().is_err());
    }
}
