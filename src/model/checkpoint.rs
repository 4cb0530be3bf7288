//! Classifier checkpoint: weights, fitted scaler, training history and run
//! metadata in a single JSON document.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::network::{ClassifierConfig, ClassifierWeights, FailureClassifier};
use super::training::TrainingHistory;
use crate::dataset::Variant;
use crate::prep::StandardScaler;
use crate::types::FEATURE_NAMES;

/// Current checkpoint format.
pub const CHECKPOINT_VERSION: u32 = 1;

/// File name used inside the output directory.
pub const CHECKPOINT_FILE: &str = "model_checkpoint.json";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported checkpoint version {found} (expected {CHECKPOINT_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("checkpoint weights do not match their layer configuration")]
    ShapeMismatch,

    #[error("checkpoint input features {found:?} differ from the C-MAPSS column layout")]
    FeatureMismatch { found: Vec<String> },
}

/// Provenance of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub variant: Variant,
    pub sequence_length: usize,
    pub failure_threshold: u32,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
    pub train_windows: usize,
    pub validation_windows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    /// Format version for forward compatibility.
    pub version: u32,
    pub config: ClassifierConfig,
    /// Seed the weights were initialized from.
    pub seed: u64,
    pub weights: ClassifierWeights,
    /// Scaler fitted on the training records; required to preprocess new data.
    pub scaler: StandardScaler,
    /// Input columns in the order the scaler and first layer expect them.
    pub feature_names: Vec<String>,
    pub history: TrainingHistory,
    pub metadata: CheckpointMetadata,
}

impl ModelCheckpoint {
    pub fn capture(
        model: &FailureClassifier,
        scaler: &StandardScaler,
        history: &TrainingHistory,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            config: model.config().clone(),
            seed: model.seed(),
            weights: model.weights().clone(),
            scaler: scaler.clone(),
            feature_names: FEATURE_NAMES.iter().map(|n| (*n).to_string()).collect(),
            history: history.clone(),
            metadata,
        }
    }

    /// Rebuild the classifier, checking version, feature layout and tensor shapes.
    pub fn restore(&self) -> Result<FailureClassifier, CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion { found: self.version });
        }
        if !self.feature_names.iter().map(String::as_str).eq(FEATURE_NAMES) {
            return Err(CheckpointError::FeatureMismatch { found: self.feature_names.clone() });
        }
        if !self.weights.matches(&self.config) {
            return Err(CheckpointError::ShapeMismatch);
        }
        Ok(FailureClassifier::from_parts(self.config.clone(), self.seed, self.weights.clone()))
    }
}

/// Save a checkpoint atomically (write temp file, then rename).
pub fn save_to_disk(cp: &ModelCheckpoint, path: &Path) -> Result<(), CheckpointError> {
    let json = serde_json::to_vec(cp)?;
    let io_err = |source| CheckpointError::Io { path: path.to_path_buf(), source };

    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(&tmp_path, &json).map_err(io_err)?;
    std::fs::rename(&tmp_path, path).map_err(io_err)?;

    tracing::info!(path = %path.display(), bytes = json.len(), "Checkpoint saved");
    Ok(())
}

pub fn load_from_disk(path: &Path) -> Result<ModelCheckpoint, CheckpointError> {
    let data = std::fs::read(path).map_err(|source| CheckpointError::Io { path: path.to_path_buf(), source })?;
    Ok(serde_json::from_slice(&data)?)
}
