//! Per-feature standardization fitted with Welford's algorithm.
//!
//! The scaler is fitted once on training records and then only read:
//! `transform` takes `&self`, so held-out data can never shift the fitted
//! mean or scale.

use serde::{Deserialize, Serialize};

use crate::types::{LabeledUnit, NUM_FEATURES};

/// Floor below which a feature is treated as constant.
const MIN_STD: f64 = 1e-12;

/// Zero-mean, unit-variance transform using population statistics (ddof = 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    count: u64,
    mean: [f64; NUM_FEATURES],
    scale: [f64; NUM_FEATURES],
}

impl StandardScaler {
    /// Fit on raw feature rows.
    pub fn fit<'a>(rows: impl IntoIterator<Item = &'a [f64; NUM_FEATURES]>) -> Self {
        let mut count = 0_u64;
        let mut mean = [0.0_f64; NUM_FEATURES];
        let mut m2 = [0.0_f64; NUM_FEATURES];

        for row in rows {
            count += 1;
            let n = count as f64;
            for i in 0..NUM_FEATURES {
                let delta = row[i] - mean[i];
                mean[i] += delta / n;
                m2[i] += delta * (row[i] - mean[i]);
            }
        }

        let mut scale = [1.0_f64; NUM_FEATURES];
        if count > 0 {
            let n = count as f64;
            for i in 0..NUM_FEATURES {
                let std = (m2[i] / n).sqrt();
                // Constant features pass through centred but unscaled.
                scale[i] = if std > MIN_STD { std } else { 1.0 };
            }
        }

        Self { count, mean, scale }
    }

    /// Fit on every record of the given (training) units.
    pub fn fit_units(units: &[LabeledUnit]) -> Self {
        Self::fit(units.iter().flat_map(|u| u.records.iter().map(|r| &r.features)))
    }

    /// Standardize one feature vector.
    pub fn transform(&self, raw: &[f64; NUM_FEATURES]) -> [f64; NUM_FEATURES] {
        let mut out = [0.0_f64; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            out[i] = (raw[i] - self.mean[i]) / self.scale[i];
        }
        out
    }

    /// Standardize into an existing buffer of length `NUM_FEATURES`.
    pub fn transform_into(&self, raw: &[f64; NUM_FEATURES], out: &mut [f64]) {
        for i in 0..NUM_FEATURES {
            out[i] = (raw[i] - self.mean[i]) / self.scale[i];
        }
    }

    /// Number of rows the scaler was fitted on.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> &[f64; NUM_FEATURES] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64; NUM_FEATURES] {
        &self.scale
    }
}
