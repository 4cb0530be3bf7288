//! Maintenance cost model.
//!
//! A false positive triggers an unnecessary preventive intervention; a false
//! negative is an unplanned failure. The model only prices a confusion
//! matrix, it never chooses a threshold.

use serde::{Deserialize, Serialize};

use super::metrics::ConfusionMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Cost of one preventive maintenance action.
    pub cost_preventive: f64,
    /// Cost of one unplanned failure.
    pub cost_failure: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self { cost_preventive: 1000.0, cost_failure: 10000.0 }
    }
}

impl CostModel {
    pub fn new(cost_preventive: f64, cost_failure: f64) -> Self {
        Self { cost_preventive, cost_failure }
    }

    /// `fp * cost_preventive + fn * cost_failure`
    pub fn total_cost(&self, confusion: &ConfusionMatrix) -> f64 {
        confusion.fp as f64 * self.cost_preventive + confusion.fn_ as f64 * self.cost_failure
    }

    /// Cost of never predicting failure: every actual positive fails.
    pub fn never_predict_cost(&self, confusion: &ConfusionMatrix) -> f64 {
        confusion.actual_positives() as f64 * self.cost_failure
    }

    pub fn report(&self, threshold: f64, confusion: &ConfusionMatrix) -> CostReport {
        let total = self.total_cost(confusion);
        let baseline = self.never_predict_cost(confusion);
        CostReport {
            threshold,
            false_positives: confusion.fp,
            false_negatives: confusion.fn_,
            preventive_cost: confusion.fp as f64 * self.cost_preventive,
            failure_cost: confusion.fn_ as f64 * self.cost_failure,
            total_cost: total,
            baseline_cost: baseline,
            savings: baseline - total,
        }
    }
}

/// Priced outcome of one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub threshold: f64,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub preventive_cost: f64,
    pub failure_cost: f64,
    pub total_cost: f64,
    /// Cost with no model at all.
    pub baseline_cost: f64,
    /// `baseline_cost - total_cost`; negative when the model is worse.
    pub savings: f64,
}

impl CostReport {
    pub fn display(&self) -> String {
        format!(
            "Cost @ threshold {:.2}\n  \
             False positives: {:>6} x preventive = ${:>12.0}\n  \
             False negatives: {:>6} x failure    = ${:>12.0}\n  \
             Total cost:                          ${:>12.0}\n  \
             Never-predict baseline:              ${:>12.0}\n  \
             Savings:                             ${:>12.0}\n",
            self.threshold,
            self.false_positives,
            self.preventive_cost,
            self.false_negatives,
            self.failure_cost,
            self.total_cost,
            self.baseline_cost,
            self.savings
        )
    }
}
