//! Versioned pipeline artifact
//!
//! File layout: magic `DAFU`, format version (u32, little endian), SHA-256 of
//! the payload (32 bytes), then the bincode-encoded [`PipelineArtifact`].

use crate::ensemble::{EnsembleModel, EnsembleParams};
use crate::error::{DafuError, Result};
use crate::evaluation::ContaminationEvaluation;
use crate::policy::DetectionPolicy;
use crate::preprocessing::PreprocessingState;
use crate::profiling::SchemaProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Magic bytes for artifact files
pub const MAGIC: [u8; 4] = *b"DAFU";
/// Current artifact format version; loading requires an exact match
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 32;

/// Training hyperparameters recorded with the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub ensemble: EnsembleParams,
    pub contamination_levels: Vec<f64>,
    pub use_labels_for_training: bool,
}

/// What the training run saw and how the members scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub n_rows: usize,
    /// Rows the detectors were fit on (fewer than `n_rows` in semi-supervised mode)
    pub n_fit_rows: usize,
    pub n_features: usize,
    pub evaluations: Vec<ContaminationEvaluation>,
    pub best_contamination: Option<f64>,
}

/// Everything needed to score new batches, persisted as one unit.
///
/// Never mutated after creation; retraining produces a new artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub format_version: u32,
    pub artifact_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub schema: SchemaProfile,
    pub preprocessing: PreprocessingState,
    pub ensemble: EnsembleModel,
    pub policy: DetectionPolicy,
    pub hyperparameters: Hyperparameters,
    pub training: TrainingSummary,
}

impl PipelineArtifact {
    pub fn new(
        schema: SchemaProfile,
        preprocessing: PreprocessingState,
        ensemble: EnsembleModel,
        policy: DetectionPolicy,
        hyperparameters: Hyperparameters,
        training: TrainingSummary,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            artifact_id: Uuid::new_v4(),
            created_at: Utc::now(),
            schema,
            preprocessing,
            ensemble,
            policy,
            hyperparameters,
            training,
        }
    }

    /// Encode as a framed byte buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let digest = Sha256::digest(&payload);

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&self.format_version.to_le_bytes());
        bytes.extend_from_slice(&digest);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode a framed byte buffer, checking magic, version and digest
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
            return Err(DafuError::CorruptArtifact(
                "not a pipeline artifact (bad header)".to_string(),
            ));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let found = u32::from_le_bytes(version);
        if found != FORMAT_VERSION {
            return Err(DafuError::VersionMismatch {
                found,
                expected: FORMAT_VERSION,
            });
        }

        let payload = &bytes[HEADER_LEN..];
        if Sha256::digest(payload).as_slice() != &bytes[8..HEADER_LEN] {
            return Err(DafuError::CorruptArtifact("checksum verification failed".to_string()));
        }

        let artifact: PipelineArtifact = bincode::deserialize(payload)
            .map_err(|e| DafuError::CorruptArtifact(format!("failed to decode payload: {}", e)))?;
        if artifact.format_version != found {
            return Err(DafuError::CorruptArtifact(format!(
                "header version {} disagrees with payload version {}",
                found, artifact.format_version
            )));
        }
        Ok(artifact)
    }

    /// Write the artifact to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;

        info!(
            path = %path.display(),
            artifact_id = %self.artifact_id,
            bytes = bytes.len(),
            "Pipeline artifact saved"
        );
        Ok(())
    }

    /// Read an artifact; fails with `ArtifactNotFound` if the path cannot be read
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let not_found = |e: std::io::Error| DafuError::ArtifactNotFound {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut bytes = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(not_found)?;

        let artifact = Self::from_bytes(&bytes)?;
        info!(
            path = %path.display(),
            artifact_id = %artifact.artifact_id,
            created_at = %artifact.created_at,
            "Pipeline artifact loaded"
        );
        Ok(artifact)
    }

    /// Hex SHA-256 of the encoded payload, useful for provenance records
    pub fn fingerprint(&self) -> Result<String> {
        let payload = bincode::serialize(self)?;
        Ok(format!("{:x}", Sha256::digest(&payload)))
    }
}
