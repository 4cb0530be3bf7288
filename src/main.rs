//! turbofan-warning: LSTM early-warning classifier for C-MAPSS engines
//!
//! # Usage
//!
//! ```bash
//! # Reference run on FD001 with defaults
//! cargo run --release -- --data-dir data/CMAPSSData
//!
//! # Different variant, shorter windows, custom output directory
//! cargo run --release -- --variant FD003 --sequence-length 30 --output-dir out/fd003
//!
//! # Settings from a TOML file, with a CLI override
//! cargo run --release -- --config pipeline.toml --epochs 20
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use turbofan_warning::config::PipelineConfig;
use turbofan_warning::dataset::Variant;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "turbofan-warning")]
#[command(about = "Train and evaluate an LSTM early-warning classifier on NASA C-MAPSS data")]
#[command(version)]
struct CliArgs {
    /// Directory containing train_FDxxx.txt, test_FDxxx.txt and RUL_FDxxx.txt
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Dataset variant (FD001..FD004)
    #[arg(long)]
    variant: Option<Variant>,

    /// Cycles per input window
    #[arg(long)]
    sequence_length: Option<usize>,

    /// Label a record as imminent failure when RUL <= this many cycles
    #[arg(long)]
    label_threshold: Option<u32>,

    /// Maximum training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Mini-batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Directory for the checkpoint and charts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Seed for weight init, splitting, shuffling and dropout
    #[arg(long)]
    seed: Option<u64>,

    /// Path to a pipeline TOML config (default: ./pipeline.toml if present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Probability threshold for the report, confusion matrix and cost
    #[arg(long)]
    decision_threshold: Option<f64>,

    /// Skip chart rendering
    #[arg(long)]
    no_plots: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl CliArgs {
    /// Apply flags on top of the loaded config.
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.data_dir {
            config.data.data_dir.clone_from(dir);
        }
        if let Some(variant) = self.variant {
            config.data.variant = variant;
        }
        if let Some(n) = self.sequence_length {
            config.windowing.sequence_length = n;
        }
        if let Some(t) = self.label_threshold {
            config.labeling.failure_threshold = t;
        }
        if let Some(e) = self.epochs {
            config.training.epochs = e;
        }
        if let Some(b) = self.batch_size {
            config.training.batch_size = b;
        }
        if let Some(dir) = &self.output_dir {
            config.output.output_dir.clone_from(dir);
        }
        if let Some(seed) = self.seed {
            config.training.seed = seed;
        }
        if let Some(t) = self.decision_threshold {
            config.evaluation.decision_threshold = t;
        }
        if self.no_plots {
            config.output.write_plots = false;
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let (mut config, source) = PipelineConfig::load(args.config.as_deref()).context("Failed to load pipeline config")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration after applying command-line flags")?;
    info!(source = %source, variant = %config.data.variant, "Configuration ready");

    if args.print_config {
        print!("{}", config.to_toml().context("Failed to serialize config")?);
        return Ok(());
    }

    let report = turbofan_warning::run(&config).context("Pipeline failed")?;

    println!("Done.");
    println!(
        "  Held-out windows: {} ({} failure)",
        report.windows.heldout, report.windows.heldout_positives
    );
    println!(
        "  Total cost @ {:.2}: ${:.0} (never-predict baseline ${:.0})",
        report.evaluation.decision_threshold, report.evaluation.cost.total_cost, report.evaluation.cost.baseline_cost
    );
    if !report.plot_failures.is_empty() {
        println!("  {} chart(s) could not be written; see log", report.plot_failures.len());
    }
    Ok(())
}
