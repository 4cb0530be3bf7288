//! End-to-end run: load, label, standardize, window, split, train, evaluate,
//! then write the checkpoint and charts.
//!
//! ```text
//! [1/7] Load dataset          train/test/RUL files for one variant
//! [2/7] Label                 RUL and imminent-failure label per record
//! [3/7] Standardize + window  scaler fitted on training records only
//! [4/7] Split                 stratified train/validation over windows
//! [5/7] Train                 stacked LSTM, early stopping
//! [6/7] Evaluate              held-out report, threshold sweep, cost
//! [7/7] Write outputs         checkpoint + five PNG charts
//! ```

use std::path::PathBuf;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::defaults::RUN_CONFIG_FILE;
use crate::config::{ConfigError, PipelineConfig};
use crate::dataset::{Dataset, DatasetError, Variant};
use crate::evaluation::{format_sweep, precision_recall_curve, roc_curve, Evaluation};
use crate::model::{
    fit, save_to_disk, CheckpointError, CheckpointMetadata, FailureClassifier, ModelCheckpoint, TrainingHistory,
    CHECKPOINT_FILE,
};
use crate::plots::{render_all, PlotInputs};
use crate::prep::{build_windows, label_heldout_units, label_training_units, stratified_split, StandardScaler};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("no training windows: every training unit is shorter than sequence_length {0}")]
    NoTrainingWindows(usize),

    #[error("no held-out windows: every held-out unit is shorter than sequence_length {0}")]
    NoHeldOutWindows(usize),

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Window counts of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub train: usize,
    pub validation: usize,
    pub heldout: usize,
    pub heldout_positives: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub variant: Variant,
    pub windows: WindowCounts,
    pub history: TrainingHistory,
    pub evaluation: Evaluation,
    pub checkpoint_path: Option<PathBuf>,
    /// Effective configuration of this run.
    pub config_path: PathBuf,
    /// Charts written successfully.
    pub plots: Vec<PathBuf>,
    /// Charts that failed to render or write.
    pub plot_failures: Vec<PathBuf>,
}

/// Execute the whole pipeline for `config`.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    config.validate()?;
    let seed = config.training.seed;
    let sequence_length = config.windowing.sequence_length;
    let threshold = config.labeling.failure_threshold;

    println!("[1/7] Loading C-MAPSS {} from {}", config.data.variant, config.data.data_dir.display());
    let dataset = Dataset::load(&config.data.data_dir, config.data.variant)?;
    dataset.print_summary();

    println!("[2/7] Labeling records (failure within {threshold} cycles)");
    let train_units = label_training_units(&dataset.train, threshold);
    let heldout_units = label_heldout_units(&dataset.heldout, &dataset.remaining, threshold)?;

    println!("[3/7] Standardizing and windowing (sequence length {sequence_length})");
    let scaler = StandardScaler::fit_units(&train_units);
    let train_windows = build_windows(&train_units, &scaler, sequence_length);
    let heldout_windows = build_windows(&heldout_units, &scaler, sequence_length);
    if train_windows.is_empty() {
        return Err(PipelineError::NoTrainingWindows(sequence_length));
    }
    if heldout_windows.is_empty() {
        return Err(PipelineError::NoHeldOutWindows(sequence_length));
    }
    println!(
        "      Training windows: {} ({} failure, {} normal)",
        train_windows.len(),
        train_windows.positives(),
        train_windows.negatives()
    );
    println!(
        "      Held-out windows: {} ({} failure, {} normal)",
        heldout_windows.len(),
        heldout_windows.positives(),
        heldout_windows.negatives()
    );

    println!("[4/7] Stratified split ({:.0}% validation)", config.training.validation_fraction * 100.0);
    let mut split_rng = StdRng::seed_from_u64(seed);
    let split = stratified_split(&train_windows.labels(), config.training.validation_fraction, &mut split_rng);
    println!("      Train: {}  Validation: {}", split.train.len(), split.validation.len());

    println!("[5/7] Training classifier");
    let mut model = FailureClassifier::new(config.model.clone(), seed);
    println!("      Parameters: {}", model.num_params());
    let history = fit(&mut model, &train_windows, &split, &config.training);
    if history.stopped_early {
        println!("      Stopped early; restored weights from epoch {}", history.best_epoch);
    }

    println!("[6/7] Evaluating on held-out windows");
    let probabilities = model.predict_proba(&heldout_windows);
    let labels = heldout_windows.labels();
    let cost_model = config.evaluation.cost_model();
    let evaluation = Evaluation::compute(&probabilities, &labels, config.evaluation.decision_threshold, &cost_model);
    print_evaluation(&evaluation);

    println!("[7/7] Writing outputs to {}", config.output.output_dir.display());
    let out_dir = &config.output.output_dir;
    std::fs::create_dir_all(out_dir).map_err(|source| PipelineError::OutputDir { path: out_dir.clone(), source })?;

    let config_path = out_dir.join(RUN_CONFIG_FILE);
    config.save_to_file(&config_path)?;
    println!("      Config: {}", config_path.display());

    let checkpoint_path = if config.output.save_checkpoint {
        let metadata = CheckpointMetadata {
            variant: config.data.variant,
            sequence_length,
            failure_threshold: threshold,
            seed,
            created_at: Utc::now(),
            train_windows: split.train.len(),
            validation_windows: split.validation.len(),
        };
        let cp = ModelCheckpoint::capture(&model, &scaler, &history, metadata);
        let path = out_dir.join(CHECKPOINT_FILE);
        save_to_disk(&cp, &path)?;
        println!("      Checkpoint: {}", path.display());
        Some(path)
    } else {
        None
    };

    let mut plots = Vec::new();
    let mut plot_failures = Vec::new();
    if config.output.write_plots {
        let roc = roc_curve(&probabilities, &labels);
        let pr = precision_recall_curve(&probabilities, &labels);
        let inputs = PlotInputs {
            confusion: &evaluation.confusion,
            roc: &roc,
            roc_auc: evaluation.roc_auc,
            pr: &pr,
            prevalence: heldout_windows.positives() as f64 / heldout_windows.len() as f64,
            history: &history,
            sweep: &evaluation.sweep,
        };
        for (path, result) in render_all(out_dir, &inputs) {
            match result {
                Ok(()) => {
                    println!("      Plot: {}", path.display());
                    plots.push(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Plot not written");
                    plot_failures.push(path);
                }
            }
        }
    }

    let report = PipelineReport {
        variant: config.data.variant,
        windows: WindowCounts {
            train: split.train.len(),
            validation: split.validation.len(),
            heldout: heldout_windows.len(),
            heldout_positives: heldout_windows.positives(),
        },
        history,
        evaluation,
        checkpoint_path,
        config_path,
        plots,
        plot_failures,
    };
    info!(
        variant = %report.variant,
        heldout = report.windows.heldout,
        total_cost = report.evaluation.cost.total_cost,
        plots = report.plots.len(),
        "Pipeline complete"
    );
    Ok(report)
}

fn print_evaluation(eval: &Evaluation) {
    println!();
    println!("{}", eval.report);
    println!("Confusion matrix @ threshold {:.2}", eval.decision_threshold);
    print!("{}", eval.confusion.display());
    println!();
    match (eval.roc_auc, eval.average_precision) {
        (Some(auc), Some(ap)) => println!("ROC AUC: {auc:.4}   Average precision: {ap:.4}"),
        _ => println!("ROC AUC / average precision undefined: held-out windows contain a single class"),
    }
    println!();
    println!("Threshold comparison");
    print!("{}", format_sweep(&eval.sweep));
    println!();
    print!("{}", eval.cost.display());
    println!();
}
