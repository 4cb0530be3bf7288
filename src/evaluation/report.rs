//! Per-class classification report.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::metrics::{f1_score, ConfusionMatrix};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub threshold: f64,
    pub normal: ClassMetrics,
    pub failure: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(confusion: &ConfusionMatrix, threshold: f64) -> Self {
        let normal = ClassMetrics {
            precision: confusion.negative_predictive_value(),
            recall: confusion.specificity(),
            f1: f1_score(confusion.negative_predictive_value(), confusion.specificity()),
            support: confusion.actual_negatives(),
        };
        let failure = ClassMetrics {
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            support: confusion.actual_positives(),
        };

        let total = confusion.total();
        let macro_avg = ClassMetrics {
            precision: (normal.precision + failure.precision) / 2.0,
            recall: (normal.recall + failure.recall) / 2.0,
            f1: (normal.f1 + failure.f1) / 2.0,
            support: total,
        };
        let weighted = |a: f64, b: f64| {
            if total == 0 {
                0.0
            } else {
                (a * normal.support as f64 + b * failure.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(normal.precision, failure.precision),
            recall: weighted(normal.recall, failure.recall),
            f1: weighted(normal.f1, failure.f1),
            support: total,
        };

        Self {
            threshold,
            normal,
            failure,
            accuracy: confusion.accuracy(),
            macro_avg,
            weighted_avg,
        }
    }

    pub fn compute(probabilities: &[f64], labels: &[u8], threshold: f64) -> Self {
        Self::from_confusion(&ConfusionMatrix::at_threshold(probabilities, labels, threshold), threshold)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>16} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                name, m.precision, m.recall, m.f1, m.support
            )
        };

        writeln!(f, "Classification report @ threshold {:.2}", self.threshold)?;
        writeln!(f, "{:>16} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        row(f, "Normal", &self.normal)?;
        row(f, "Failure", &self.failure)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>16} {:>10} {:>10} {:>10.4} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_values() {
        let cm = ConfusionMatrix { tp: 30, tn: 60, fp: 10, fn_: 0 };
        let r = ClassificationReport::from_confusion(&cm, 0.5);
        assert_eq!(r.normal.support, 70);
        assert_eq!(r.failure.support, 30);
        assert!((r.failure.recall - 1.0).abs() < 1e-9);
        assert!((r.failure.precision - 0.75).abs() < 1e-9);
        assert!((r.normal.precision - 1.0).abs() < 1e-9);
        assert!((r.accuracy - 0.9).abs() < 1e-9);
        let expected = (r.normal.recall * 70.0 + r.failure.recall * 30.0) / 100.0;
        assert!((r.weighted_avg.recall - expected).abs() < 1e-12);
    }

    #[test]
    fn test_display_lists_both_classes() {
        let r = ClassificationReport::compute(&[0.9, 0.1], &[1, 0], 0.5);
        let text = r.to_string();
        assert!(text.contains("Normal"));
        assert!(text.contains("Failure"));
        assert!(text.contains("weighted avg"));
    }
}
