//! Per-cycle engine records: raw, labeled, and grouped by unit.

use serde::{Deserialize, Serialize};

/// Engine identifier as it appears in the first column of the data files.
pub type UnitId = u32;

/// Number of operational-setting columns.
pub const NUM_SETTINGS: usize = 3;

/// Number of sensor channels.
pub const NUM_SENSORS: usize = 21;

/// Model input width: settings followed by sensors, in file column order.
pub const NUM_FEATURES: usize = NUM_SETTINGS + NUM_SENSORS;

/// Feature names (matches column order after unit id and cycle).
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "setting_1", "setting_2", "setting_3",
    "s1", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "s12", "s13", "s14",
    "s15", "s16", "s17", "s18", "s19", "s20", "s21",
];

/// One time step of one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub unit_id: UnitId,
    /// 1-based cycle index, strictly increasing within a unit.
    pub cycle: u32,
    /// Operational settings then sensors.
    pub features: [f64; NUM_FEATURES],
}

/// One engine with its records in ascending cycle order.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub id: UnitId,
    pub records: Vec<CycleRecord>,
}

impl Unit {
    /// Highest cycle observed for this unit (0 for an empty unit).
    pub fn max_cycle(&self) -> u32 {
        self.records.last().map_or(0, |r| r.cycle)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A cycle record with its derived remaining useful life and label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub cycle: u32,
    pub features: [f64; NUM_FEATURES],
    /// Cycles remaining until failure.
    pub rul: u32,
    /// 1 when `rul` is within the failure threshold.
    pub label: u8,
}

/// A unit whose records carry RUL and labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledUnit {
    pub id: UnitId,
    pub records: Vec<LabeledRecord>,
}

impl LabeledUnit {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records labeled as imminent failure.
    pub fn positives(&self) -> usize {
        self.records.iter().filter(|r| r.label == 1).count()
    }
}
