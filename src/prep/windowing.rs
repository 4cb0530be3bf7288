//! Fixed-length sliding windows over each unit's normalized series.
//!
//! Each unit is standardized once into a contiguous row-major matrix. A window
//! is a borrowed slice of `sequence_length` consecutive rows of that matrix,
//! so it cannot span two units by construction. Stride is 1; a unit with `n`
//! records yields `max(0, n - sequence_length + 1)` windows, each labeled with
//! the label of its final record.

use crate::prep::StandardScaler;
use crate::types::{LabeledUnit, UnitId, NUM_FEATURES};

/// One unit's standardized series.
#[derive(Debug, Clone)]
pub struct NormalizedSeries {
    pub unit_id: UnitId,
    pub cycles: Vec<u32>,
    pub ruls: Vec<u32>,
    pub labels: Vec<u8>,
    /// Row-major `[len x NUM_FEATURES]`.
    pub values: Vec<f64>,
}

impl NormalizedSeries {
    pub fn from_unit(unit: &LabeledUnit, scaler: &StandardScaler) -> Self {
        let n = unit.records.len();
        let mut values = vec![0.0; n * NUM_FEATURES];
        for (row, rec) in values.chunks_exact_mut(NUM_FEATURES).zip(&unit.records) {
            scaler.transform_into(&rec.features, row);
        }

        Self {
            unit_id: unit.id,
            cycles: unit.records.iter().map(|r| r.cycle).collect(),
            ruls: unit.records.iter().map(|r| r.rul).collect(),
            labels: unit.records.iter().map(|r| r.label).collect(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Window of `sequence_length` rows starting at row `start`.
    fn window(&self, start: usize, sequence_length: usize) -> Window<'_> {
        let end = start + sequence_length - 1;
        Window {
            unit_id: self.unit_id,
            end_cycle: self.cycles[end],
            rul: self.ruls[end],
            label: self.labels[end],
            values: &self.values[start * NUM_FEATURES..(end + 1) * NUM_FEATURES],
        }
    }
}

/// Number of stride-1 windows a series of `len` records produces.
#[inline]
pub const fn window_count(len: usize, sequence_length: usize) -> usize {
    if sequence_length == 0 || len < sequence_length {
        0
    } else {
        len - sequence_length + 1
    }
}

/// Stride-1 windows over one unit's series, in cycle order.
pub fn windows_for_unit(series: &NormalizedSeries, sequence_length: usize) -> impl Iterator<Item = Window<'_>> + '_ {
    (0..window_count(series.len(), sequence_length)).map(move |start| series.window(start, sequence_length))
}

/// Standardize `units` and index every window they produce.
pub fn build_windows(units: &[LabeledUnit], scaler: &StandardScaler, sequence_length: usize) -> WindowSet {
    WindowSet::build(units, scaler, sequence_length)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowIndex {
    series: usize,
    start: usize,
}

/// A borrowed model input: `sequence_length` consecutive rows of one unit.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub unit_id: UnitId,
    /// Cycle of the final record.
    pub end_cycle: u32,
    /// RUL of the final record.
    pub rul: u32,
    /// Label of the final record.
    pub label: u8,
    values: &'a [f64],
}

impl<'a> Window<'a> {
    pub fn sequence_length(&self) -> usize {
        self.values.len() / NUM_FEATURES
    }

    /// Feature rows in time order.
    pub fn steps(&self) -> std::slice::ChunksExact<'a, f64> {
        self.values.chunks_exact(NUM_FEATURES)
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }
}

/// All windows over a collection of units.
#[derive(Debug, Clone)]
pub struct WindowSet {
    sequence_length: usize,
    series: Vec<NormalizedSeries>,
    index: Vec<WindowIndex>,
}

impl WindowSet {
    /// Standardize every unit with the fitted `scaler` and index its windows.
    pub fn build(units: &[LabeledUnit], scaler: &StandardScaler, sequence_length: usize) -> Self {
        let series: Vec<NormalizedSeries> = units
            .iter()
            .map(|u| NormalizedSeries::from_unit(u, scaler))
            .collect();

        let mut index = Vec::with_capacity(
            series.iter().map(|s| window_count(s.len(), sequence_length)).sum(),
        );
        for (si, s) in series.iter().enumerate() {
            for start in 0..window_count(s.len(), sequence_length) {
                index.push(WindowIndex { series: si, start });
            }
        }

        let set = Self { sequence_length, series, index };
        let too_short = set.series.iter().filter(|s| s.len() < sequence_length).count();
        tracing::debug!(
            units = set.series.len(),
            windows = set.len(),
            positives = set.positives(),
            units_too_short = too_short,
            "Windows built"
        );
        set
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Borrow window `i`.
    ///
    /// # Panics
    /// If `i >= self.len()`.
    pub fn get(&self, i: usize) -> Window<'_> {
        let WindowIndex { series, start } = self.index[i];
        self.series[series].window(start, self.sequence_length)
    }

    pub fn iter(&self) -> impl Iterator<Item = Window<'_>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Label of every window, in index order.
    pub fn labels(&self) -> Vec<u8> {
        self.iter().map(|w| w.label).collect()
    }

    pub fn positives(&self) -> usize {
        self.iter().filter(|w| w.label == 1).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }

    /// Windows produced by one unit.
    pub fn count_for_unit(&self, unit: UnitId) -> usize {
        self.iter().filter(|w| w.unit_id == unit).count()
    }

    pub fn series(&self) -> &[NormalizedSeries] {
        &self.series
    }
}
