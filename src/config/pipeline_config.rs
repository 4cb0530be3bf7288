//! Pipeline configuration: every tunable of a run as TOML values.
//!
//! Each section implements `Default` with the standard experiment settings,
//! so an empty or missing file reproduces the reference run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::dataset::Variant;
use crate::evaluation::CostModel;
use crate::model::{ClassifierConfig, TrainingConfig};
use crate::prep::DEFAULT_FAILURE_THRESHOLD;

// ============================================================================
// Top-Level Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub labeling: LabelingConfig,

    #[serde(default)]
    pub windowing: WindowingConfig,

    /// Classifier layer sizes and dropout
    #[serde(default)]
    pub model: ClassifierConfig,

    /// Optimizer, schedule and stopping rules
    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults => f.write_str("built-in defaults"),
        }
    }
}

impl PipelineConfig {
    /// Load using the standard search order:
    /// 1. `explicit` path (from `--config`); failure here is an error
    /// 2. `./pipeline.toml`; failure here falls back to defaults with a warning
    /// 3. Built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded pipeline config");
            return Ok((config, ConfigSource::File(path.to_path_buf())));
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded pipeline config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return Ok((config, ConfigSource::File(local)));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No pipeline config found, using built-in defaults");
        Ok((Self::default(), ConfigSource::Defaults))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged as warnings.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Pipeline config saved");
        Ok(())
    }

    /// Check every range constraint, collecting all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_ranges(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub variant: Variant,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from(defaults::DATA_DIR), variant: Variant::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    /// A record is labeled imminent failure when `RUL <= failure_threshold`.
    pub failure_threshold: u32,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self { failure_threshold: DEFAULT_FAILURE_THRESHOLD }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowingConfig {
    pub sequence_length: usize,
}

impl Default for WindowingConfig {
    fn default() -> Self {
        Self { sequence_length: defaults::SEQUENCE_LENGTH }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Threshold for the confusion matrix, report and cost figures.
    pub decision_threshold: f64,
    pub cost_preventive: f64,
    pub cost_failure: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        let cost = CostModel::default();
        Self {
            decision_threshold: defaults::DECISION_THRESHOLD,
            cost_preventive: cost.cost_preventive,
            cost_failure: cost.cost_failure,
        }
    }
}

impl EvaluationConfig {
    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.cost_preventive, self.cost_failure)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub write_plots: bool,
    pub save_checkpoint: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { output_dir: PathBuf::from(defaults::OUTPUT_DIR), write_plots: true, save_checkpoint: true }
    }
}
