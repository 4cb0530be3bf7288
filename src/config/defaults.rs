//! Default constants for the pipeline configuration.

// ============================================================================
// Data
// ============================================================================

/// Directory holding the C-MAPSS text files.
pub const DATA_DIR: &str = "data/CMAPSSData";

/// Config file picked up from the working directory when `--config` is absent.
pub const LOCAL_CONFIG_FILE: &str = "pipeline.toml";

// ============================================================================
// Windowing & evaluation
// ============================================================================

/// Cycles per model input window.
pub const SEQUENCE_LENGTH: usize = 50;

/// Probability at or above which a window is flagged as imminent failure.
pub const DECISION_THRESHOLD: f64 = 0.5;

// ============================================================================
// Output
// ============================================================================

pub const OUTPUT_DIR: &str = "output";

/// Effective configuration written next to the run outputs.
pub const RUN_CONFIG_FILE: &str = "run_config.toml";

/// Seed shared by weight init, splitting, shuffling and dropout.
pub const SEED: u64 = 42;
