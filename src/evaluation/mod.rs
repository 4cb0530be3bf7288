//! Held-out evaluation: confusion matrices, threshold sweep, ranking curves
//! and the maintenance cost model.

pub mod cost;
pub mod curves;
pub mod metrics;
pub mod report;
pub mod thresholds;

pub use cost::{CostModel, CostReport};
pub use curves::{average_precision, precision_recall_curve, roc_auc, roc_curve, PrPoint, RocPoint};
pub use metrics::{binary_cross_entropy, ConfusionMatrix, ThresholdMetrics};
pub use report::{ClassMetrics, ClassificationReport};
pub use thresholds::{format_sweep, sweep_thresholds, threshold_sweep, DEFAULT_THRESHOLDS};

use serde::{Deserialize, Serialize};

/// Everything computed from one set of held-out predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision_threshold: f64,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
    pub sweep: Vec<ThresholdMetrics>,
    pub roc_auc: Option<f64>,
    pub average_precision: Option<f64>,
    pub cost: CostReport,
}

impl Evaluation {
    pub fn compute(probabilities: &[f64], labels: &[u8], decision_threshold: f64, cost_model: &CostModel) -> Self {
        let confusion = ConfusionMatrix::at_threshold(probabilities, labels, decision_threshold);
        Self {
            decision_threshold,
            confusion,
            report: ClassificationReport::from_confusion(&confusion, decision_threshold),
            sweep: threshold_sweep(probabilities, labels),
            roc_auc: roc_auc(probabilities, labels),
            average_precision: average_precision(probabilities, labels),
            cost: cost_model.report(decision_threshold, &confusion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_is_consistent() {
        let probs = [0.9, 0.7, 0.4, 0.2, 0.6, 0.1];
        let labels = [1, 1, 1, 0, 0, 0];
        let eval = Evaluation::compute(&probs, &labels, 0.5, &CostModel::default());
        assert_eq!(eval.confusion.tp, 2);
        assert_eq!(eval.confusion.fp, 1);
        assert_eq!(eval.sweep.len(), DEFAULT_THRESHOLDS.len());
        assert_eq!(eval.cost.total_cost, 1000.0 + 10000.0);
        assert!(eval.roc_auc.is_some());
    }
}
