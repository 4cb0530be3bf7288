//! Stacked-LSTM failure classifier with manual backpropagation.
//!
//! - `layers`: dense, layer-norm, dropout
//! - `lstm`: LSTM layer and BPTT
//! - `network`: the fixed classifier architecture
//! - `training`: Adam, mini-batch loop, early stopping
//! - `checkpoint`: JSON persistence

pub mod checkpoint;
pub mod layers;
pub mod lstm;
pub mod network;
pub mod training;

pub use checkpoint::{
    load_from_disk, save_to_disk, CheckpointError, CheckpointMetadata, ModelCheckpoint, CHECKPOINT_FILE,
};
pub use network::{ClassifierConfig, ClassifierWeights, FailureClassifier};
pub use training::{fit, AdamOptimizer, EpochMetrics, SplitMetrics, TrainingConfig, TrainingHistory};
