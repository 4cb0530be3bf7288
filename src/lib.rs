//! Turbofan Early Warning
//!
//! Trains a stacked-LSTM classifier on the NASA C-MAPSS run-to-failure data
//! to flag engines whose remaining useful life has dropped inside a failure
//! horizon, then evaluates it on held-out engines and prices its errors.
//!
//! ## Modules
//!
//! - **dataset**: C-MAPSS file parsing and unit grouping
//! - **prep**: RUL labeling, standardization, windowing, stratified split
//! - **model**: LSTM classifier, training loop, checkpoints
//! - **evaluation**: confusion matrix, threshold sweep, curves, cost model
//! - **plots**: PNG charts
//! - **pipeline**: the end-to-end run

pub mod config;
pub mod dataset;
pub mod evaluation;
pub mod model;
pub mod pipeline;
pub mod plots;
pub mod prep;
pub mod types;

pub use config::PipelineConfig;
pub use dataset::{Dataset, DatasetError, Variant};
pub use evaluation::{ConfusionMatrix, CostModel, Evaluation, ThresholdMetrics};
pub use model::{FailureClassifier, ModelCheckpoint, TrainingConfig, TrainingHistory};
pub use pipeline::{run, PipelineError, PipelineReport};
pub use prep::{StandardScaler, WindowSet};
pub use types::{CycleRecord, LabeledRecord, LabeledUnit, Unit, UnitId};
