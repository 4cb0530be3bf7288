//! C-MAPSS Turbofan Dataset Loading
//!
//! Loads one dataset variant (FD001..FD004) from a directory holding the
//! three NASA text files:
//!
//! - `train_<V>.txt`: full run-to-failure histories
//! - `test_<V>.txt`: histories truncated some cycles before failure
//! - `RUL_<V>.txt`: remaining cycles beyond truncation, one per test unit
//!
//! # Usage
//!
//! ```ignore
//! use turbofan_warning::dataset::{Dataset, Variant};
//!
//! let dataset = Dataset::load("data/CMAPSSData", Variant::Fd001)?;
//! dataset.print_summary();
//! ```

pub mod cmapss;

pub use cmapss::{group_units, load_records, load_remaining_cycles, RemainingCycles};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Unit, UnitId};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse { path: PathBuf, line: usize, message: String },

    #[error("{path}:{line}: expected {expected} columns, found {found}")]
    ColumnCount { path: PathBuf, line: usize, expected: usize, found: usize },

    #[error("no records in {0}")]
    Empty(PathBuf),

    #[error("unit {unit} repeats cycle {cycle}")]
    DuplicateCycle { unit: UnitId, cycle: u32 },

    #[error("remaining-cycles file lists {found} values for {expected} held-out units")]
    RemainingCount { expected: usize, found: usize },

    #[error("no remaining-cycles value for held-out unit {0}")]
    MissingRemaining(UnitId),

    #[error("held-out unit {unit}: remaining cycles {remaining} overflow the failure cycle")]
    RemainingOverflow { unit: UnitId, remaining: u32 },

    #[error("{0} mixes single-value and keyed lines")]
    MixedRemainingFormat(PathBuf),

    #[error("unknown dataset variant '{0}' (expected FD001..FD004)")]
    UnknownVariant(String),
}

/// One of the four C-MAPSS sub-datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Variant {
    /// One operating condition, one fault mode.
    #[default]
    #[serde(rename = "FD001")]
    Fd001,
    /// Six operating conditions, one fault mode.
    #[serde(rename = "FD002")]
    Fd002,
    /// One operating condition, two fault modes.
    #[serde(rename = "FD003")]
    Fd003,
    /// Six operating conditions, two fault modes.
    #[serde(rename = "FD004")]
    Fd004,
}

impl Variant {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fd001 => "FD001",
            Self::Fd002 => "FD002",
            Self::Fd003 => "FD003",
            Self::Fd004 => "FD004",
        }
    }

    pub fn train_file(self) -> String {
        format!("train_{}.txt", self.as_str())
    }

    pub fn test_file(self) -> String {
        format!("test_{}.txt", self.as_str())
    }

    pub fn rul_file(self) -> String {
        format!("RUL_{}.txt", self.as_str())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FD001" | "1" => Ok(Self::Fd001),
            "FD002" | "2" => Ok(Self::Fd002),
            "FD003" | "3" => Ok(Self::Fd003),
            "FD004" | "4" => Ok(Self::Fd004),
            _ => Err(DatasetError::UnknownVariant(s.to_string())),
        }
    }
}

/// Unit/record counts for one split, for quick validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub units: usize,
    pub records: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
}

impl SplitSummary {
    pub fn of(units: &[Unit]) -> Self {
        let records: usize = units.iter().map(Unit::len).sum();
        let min_length = units.iter().map(Unit::len).min().unwrap_or(0);
        let max_length = units.iter().map(Unit::len).max().unwrap_or(0);
        let mean_length = if units.is_empty() {
            0.0
        } else {
            records as f64 / units.len() as f64
        };
        Self { units: units.len(), records, min_length, max_length, mean_length }
    }
}

/// A loaded dataset variant: training units, held-out units, and the
/// held-out remaining-cycles map.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub variant: Variant,
    pub source_dir: PathBuf,
    pub train: Vec<Unit>,
    pub heldout: Vec<Unit>,
    pub remaining: RemainingCycles,
}

impl Dataset {
    /// Load the three files of `variant` from `dir`.
    pub fn load(dir: impl AsRef<Path>, variant: Variant) -> Result<Self, DatasetError> {
        let dir = dir.as_ref();

        let train = group_units(load_records(dir.join(variant.train_file()))?)?;
        let heldout = group_units(load_records(dir.join(variant.test_file()))?)?;
        let remaining = load_remaining_cycles(dir.join(variant.rul_file()), &heldout)?;

        let dataset = Self {
            variant,
            source_dir: dir.to_path_buf(),
            train,
            heldout,
            remaining,
        };

        let train_summary = dataset.train_summary();
        let heldout_summary = dataset.heldout_summary();
        tracing::info!(
            variant = %variant,
            train_units = train_summary.units,
            train_records = train_summary.records,
            heldout_units = heldout_summary.units,
            heldout_records = heldout_summary.records,
            "Dataset loaded"
        );

        Ok(dataset)
    }

    pub fn train_summary(&self) -> SplitSummary {
        SplitSummary::of(&self.train)
    }

    pub fn heldout_summary(&self) -> SplitSummary {
        SplitSummary::of(&self.heldout)
    }

    /// Summary statistics for quick validation.
    pub fn print_summary(&self) {
        let print_split = |name: &str, s: &SplitSummary| {
            println!(
                "  {:<9} {:>4} units, {:>6} records, length {}-{} (mean {:.1})",
                name, s.units, s.records, s.min_length, s.max_length, s.mean_length
            );
        };

        println!("=== C-MAPSS {} ===", self.variant);
        println!("  Source:    {}", self.source_dir.display());
        print_split("Train:", &self.train_summary());
        print_split("Held-out:", &self.heldout_summary());
    }
}
