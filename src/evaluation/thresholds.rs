//! Fixed decision-threshold sweep.

use super::metrics::ThresholdMetrics;

/// Thresholds compared in every evaluation report.
pub const DEFAULT_THRESHOLDS: [f64; 4] = [0.3, 0.5, 0.7, 0.9];

/// Metrics at each of [`DEFAULT_THRESHOLDS`], in ascending threshold order.
pub fn threshold_sweep(probabilities: &[f64], labels: &[u8]) -> Vec<ThresholdMetrics> {
    sweep_thresholds(probabilities, labels, &DEFAULT_THRESHOLDS)
}

/// Metrics at each of the given thresholds, in the given order.
pub fn sweep_thresholds(probabilities: &[f64], labels: &[u8], thresholds: &[f64]) -> Vec<ThresholdMetrics> {
    thresholds
        .iter()
        .map(|&t| ThresholdMetrics::compute(probabilities, labels, t))
        .collect()
}

/// Console table of a sweep.
pub fn format_sweep(rows: &[ThresholdMetrics]) -> String {
    let mut out = String::from("Threshold  Precision  Recall     F1         TP     FP     FN     TN\n");
    for m in rows {
        out.push_str(&format!(
            "{:<10.2} {:<10.4} {:<10.4} {:<10.4} {:<6} {:<6} {:<6} {:<6}\n",
            m.threshold,
            m.precision,
            m.recall,
            m.f1,
            m.confusion.tp,
            m.confusion.fp,
            m.confusion.fn_,
            m.confusion.tn
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_covers_fixed_thresholds() {
        let probs = [0.95, 0.8, 0.6, 0.4, 0.2, 0.1];
        let labels = [1, 1, 0, 1, 0, 0];
        let rows = threshold_sweep(&probs, &labels);
        let ts: Vec<f64> = rows.iter().map(|m| m.threshold).collect();
        assert_eq!(ts, vec![0.3, 0.5, 0.7, 0.9]);
    }

    #[test]
    fn test_recall_non_increasing_with_threshold() {
        let probs = [0.95, 0.8, 0.6, 0.4, 0.2, 0.1, 0.55, 0.72];
        let labels = [1, 1, 0, 1, 0, 0, 1, 0];
        let rows = threshold_sweep(&probs, &labels);
        for pair in rows.windows(2) {
            assert!(pair[1].recall <= pair[0].recall + 1e-12);
            assert!(pair[1].confusion.tp + pair[1].confusion.fp <= pair[0].confusion.tp + pair[0].confusion.fp);
        }
    }

    #[test]
    fn test_format_has_row_per_threshold() {
        let rows = threshold_sweep(&[0.5], &[1]);
        assert_eq!(format_sweep(&rows).lines().count(), 5);
    }
}
