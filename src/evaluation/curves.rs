//! ROC and precision-recall curves over distinct score thresholds.

use serde::{Deserialize, Serialize};

/// A point on the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

/// A point on the precision-recall curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrPoint {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Cumulative (threshold, tp, fp) at each distinct score, highest score first.
fn cumulative_counts(scores: &[f64], labels: &[u8]) -> Vec<(f64, usize, usize)> {
    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(labels)
        .map(|(&s, &y)| (s, y == 1))
        .collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut out = Vec::new();
    let (mut tp, mut fp) = (0_usize, 0_usize);
    for (i, &(score, positive)) in pairs.iter().enumerate() {
        if positive {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_tie = pairs.get(i + 1).map_or(true, |next| next.0 != score);
        if last_of_tie {
            out.push((score, tp, fp));
        }
    }
    out
}

/// ROC curve starting at (0, 0) and ending at (1, 1).
///
/// Returns an empty curve when either class is absent.
pub fn roc_curve(scores: &[f64], labels: &[u8]) -> Vec<RocPoint> {
    let n = scores.len().min(labels.len());
    let positives = labels[..n].iter().filter(|&&y| y == 1).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return Vec::new();
    }

    let mut curve = vec![RocPoint { threshold: f64::INFINITY, fpr: 0.0, tpr: 0.0 }];
    curve.extend(cumulative_counts(scores, labels).into_iter().map(|(threshold, tp, fp)| RocPoint {
        threshold,
        fpr: fp as f64 / negatives as f64,
        tpr: tp as f64 / positives as f64,
    }));
    curve
}

/// Area under the ROC curve by the trapezoid rule, or `None` when either
/// class is absent.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    let curve = roc_curve(scores, labels);
    if curve.is_empty() {
        return None;
    }
    Some(
        curve
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
            .sum(),
    )
}

/// Precision-recall curve ordered by decreasing threshold, starting at
/// (recall 0, precision 1). Empty when there are no positives.
pub fn precision_recall_curve(scores: &[f64], labels: &[u8]) -> Vec<PrPoint> {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    if positives == 0 {
        return Vec::new();
    }

    let mut curve = vec![PrPoint { threshold: f64::INFINITY, precision: 1.0, recall: 0.0 }];
    curve.extend(cumulative_counts(scores, labels).into_iter().map(|(threshold, tp, fp)| PrPoint {
        threshold,
        precision: tp as f64 / (tp + fp) as f64,
        recall: tp as f64 / positives as f64,
    }));
    curve
}

/// Average precision: `sum (R_k - R_{k-1}) * P_k` over the PR curve.
pub fn average_precision(scores: &[f64], labels: &[u8]) -> Option<f64> {
    let curve = precision_recall_curve(scores, labels);
    if curve.is_empty() {
        return None;
    }
    Some(
        curve
            .windows(2)
            .map(|w| (w[1].recall - w[0].recall) * w[1].precision)
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_separation() {
        let scores = [0.9, 0.8, 0.3, 0.1];
        let labels = [1, 1, 0, 0];
        assert!((roc_auc(&scores, &labels).expect("auc") - 1.0).abs() < 1e-12);
        assert!((average_precision(&scores, &labels).expect("ap") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_scores() {
        let scores = [0.1, 0.2, 0.8, 0.9];
        let labels = [1, 1, 0, 0];
        assert!(roc_auc(&scores, &labels).expect("auc").abs() < 1e-12);
    }

    #[test]
    fn test_known_auc() {
        // Classic example: AUC = 0.75.
        let scores = [0.1, 0.4, 0.35, 0.8];
        let labels = [0, 0, 1, 1];
        assert!((roc_auc(&scores, &labels).expect("auc") - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ties_collapse_to_one_point() {
        let scores = [0.5, 0.5, 0.5, 0.5];
        let labels = [1, 0, 1, 0];
        let curve = roc_curve(&scores, &labels);
        assert_eq!(curve.len(), 2);
        assert!((roc_auc(&scores, &labels).expect("auc") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_curve_endpoints() {
        let scores = [0.7, 0.2, 0.6, 0.9, 0.1];
        let labels = [1, 0, 0, 1, 0];
        let roc = roc_curve(&scores, &labels);
        assert_eq!((roc[0].fpr, roc[0].tpr), (0.0, 0.0));
        let last = roc[roc.len() - 1];
        assert_eq!((last.fpr, last.tpr), (1.0, 1.0));

        let pr = precision_recall_curve(&scores, &labels);
        assert_eq!(pr[0].recall, 0.0);
        assert_eq!(pr[pr.len() - 1].recall, 1.0);
    }

    #[test]
    fn test_single_class_is_undefined() {
        assert!(roc_auc(&[0.1, 0.9], &[0, 0]).is_none());
        assert!(average_precision(&[0.1, 0.9], &[0, 0]).is_none());
        assert!(roc_curve(&[0.1, 0.9], &[1, 1]).is_empty());
    }
}
