//! Confusion matrix and threshold-dependent classification metrics.

use serde::{Deserialize, Serialize};

/// Added to every ratio denominator so empty classes yield 0 instead of NaN.
pub const EPSILON: f64 = 1e-10;

/// Binary confusion matrix (positive class = imminent failure).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Count outcomes, predicting failure when `probability >= threshold`.
    pub fn at_threshold(probabilities: &[f64], labels: &[u8], threshold: f64) -> Self {
        let mut cm = Self::default();
        for (&p, &y) in probabilities.iter().zip(labels) {
            match (y == 1, p >= threshold) {
                (true, true) => cm.tp += 1,
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub const fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub const fn actual_positives(&self) -> usize {
        self.tp + self.fn_
    }

    pub const fn actual_negatives(&self) -> usize {
        self.tn + self.fp
    }

    pub fn accuracy(&self) -> f64 {
        (self.tp + self.tn) as f64 / (self.total() as f64 + EPSILON)
    }

    /// `tp / (tp + fp + eps)`
    pub fn precision(&self) -> f64 {
        self.tp as f64 / ((self.tp + self.fp) as f64 + EPSILON)
    }

    /// `tp / (tp + fn + eps)`
    pub fn recall(&self) -> f64 {
        self.tp as f64 / ((self.tp + self.fn_) as f64 + EPSILON)
    }

    /// `2pr / (p + r + eps)`
    pub fn f1(&self) -> f64 {
        f1_score(self.precision(), self.recall())
    }

    /// Precision of the negative class.
    pub fn negative_predictive_value(&self) -> f64 {
        self.tn as f64 / ((self.tn + self.fn_) as f64 + EPSILON)
    }

    /// Recall of the negative class.
    pub fn specificity(&self) -> f64 {
        self.tn as f64 / ((self.tn + self.fp) as f64 + EPSILON)
    }

    /// Rows = actual (0, 1), columns = predicted (0, 1).
    pub const fn as_grid(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    /// Formatted 2x2 table.
    pub fn display(&self) -> String {
        format!(
            "                 Predicted 0   Predicted 1\n\
             Actual 0 (ok)   {:>11}   {:>11}\n\
             Actual 1 (fail) {:>11}   {:>11}\n",
            self.tn, self.fp, self.fn_, self.tp
        )
    }
}

#[inline]
pub fn f1_score(precision: f64, recall: f64) -> f64 {
    2.0 * precision * recall / (precision + recall + EPSILON)
}

/// Metrics at one decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

impl ThresholdMetrics {
    pub fn compute(probabilities: &[f64], labels: &[u8], threshold: f64) -> Self {
        let confusion = ConfusionMatrix::at_threshold(probabilities, labels, threshold);
        Self {
            threshold,
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            confusion,
        }
    }
}

/// Mean binary cross-entropy with probabilities clamped away from 0 and 1.
pub fn binary_cross_entropy(probabilities: &[f64], labels: &[u8]) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }
    let total: f64 = probabilities
        .iter()
        .zip(labels)
        .map(|(&p, &y)| bce_term(p, y))
        .sum();
    total / probabilities.len() as f64
}

/// Clamp bound shared by loss computations.
pub const PROBABILITY_CLAMP: f64 = 1e-7;

#[inline]
pub fn bce_term(p: f64, y: u8) -> f64 {
    let p = p.clamp(PROBABILITY_CLAMP, 1.0 - PROBABILITY_CLAMP);
    if y == 1 {
        -p.ln()
    } else {
        -(1.0 - p).ln()
    }
}
