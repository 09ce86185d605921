//! Holdout evaluation metrics for binary classifiers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EvaluationError {
    #[error("no samples to evaluate")]
    Empty,
    #[error("{labels} labels but {scores} scores")]
    LengthMismatch { labels: usize, scores: usize },
    #[error("holdout contains no positive labels; precision-recall curve is undefined")]
    NoPositives,
}

/// Metrics computed on the holdout partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub pr_auc: f64,
}

/// Confusion counts at a fixed decision threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl Confusion {
    pub fn from_predictions(labels: &[u8], predictions: &[u8]) -> Self {
        let mut confusion = Confusion::default();
        for (&label, &prediction) in labels.iter().zip(predictions) {
            match (label, prediction) {
                (1, 1) => confusion.true_positives += 1,
                (0, 1) => confusion.false_positives += 1,
                (1, _) => confusion.false_negatives += 1,
                _ => confusion.true_negatives += 1,
            }
        }
        confusion
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// Zero when nothing was predicted positive
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Zero when there are no positive labels
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Precision and recall at every achievable threshold.
///
/// Points are ordered by decreasing recall (increasing threshold) and end
/// with the `(recall 0, precision 1)` anchor, which has no threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionRecallCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub thresholds: Vec<f64>,
}

impl PrecisionRecallCurve {
    pub fn compute(labels: &[u8], scores: &[f64]) -> Result<Self, EvaluationError> {
        if labels.len() != scores.len() {
            return Err(EvaluationError::LengthMismatch {
                labels: labels.len(),
                scores: scores.len(),
            });
        }
        if labels.is_empty() {
            return Err(EvaluationError::Empty);
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        // Cumulative counts at the last index of each distinct score
        let mut tps = Vec::new();
        let mut fps = Vec::new();
        let mut thresholds = Vec::new();
        let (mut tp, mut fp) = (0usize, 0usize);
        for (i, &idx) in order.iter().enumerate() {
            if labels[idx] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            let last_of_group = order
                .get(i + 1)
                .map_or(true, |&next| scores[next] != scores[idx]);
            if last_of_group {
                tps.push(tp);
                fps.push(fp);
                thresholds.push(scores[idx]);
            }
        }

        let total_positives = tp;
        if total_positives == 0 {
            return Err(EvaluationError::NoPositives);
        }

        let mut precision = Vec::with_capacity(tps.len() + 1);
        let mut recall = Vec::with_capacity(tps.len() + 1);
        for k in (0..tps.len()).rev() {
            precision.push(tps[k] as f64 / (tps[k] + fps[k]) as f64);
            recall.push(tps[k] as f64 / total_positives as f64);
        }
        precision.push(1.0);
        recall.push(0.0);
        thresholds.reverse();

        Ok(Self {
            precision,
            recall,
            thresholds,
        })
    }

    /// Area under the curve by the trapezoidal rule over recall.
    pub fn auc(&self) -> f64 {
        self.recall
            .windows(2)
            .zip(self.precision.windows(2))
            .map(|(r, p)| (r[0] - r[1]) * (p[0] + p[1]) / 2.0)
            .sum()
    }
}

/// Evaluate positive-class probabilities against `0`/`1` labels.
pub fn evaluate(labels: &[u8], probabilities: &[f64]) -> Result<EvaluationMetrics, EvaluationError> {
    let curve = PrecisionRecallCurve::compute(labels, probabilities)?;

    let predictions: Vec<u8> = probabilities.iter().map(|&p| u8::from(p > 0.5)).collect();
    let confusion = Confusion::from_predictions(labels, &predictions);

    Ok(EvaluationMetrics {
        accuracy: confusion.accuracy(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1_score: confusion.f1_score(),
        pr_auc: curve.auc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_confusion_metrics() {
        let labels = [1, 1, 0, 0, 1];
        let predictions = [1, 0, 0, 1, 1];
        let c = Confusion::from_predictions(&labels, &predictions);
        assert_eq!(c.true_positives, 2);
        assert_eq!(c.false_positives, 1);
        assert_eq!(c.false_negatives, 1);
        assert_eq!(c.true_negatives, 1);
        assert!(close(c.accuracy(), 0.6));
        assert!(close(c.precision(), 2.0 / 3.0));
        assert!(close(c.recall(), 2.0 / 3.0));
        assert!(close(c.f1_score(), 2.0 / 3.0));
    }

    #[test]
    fn test_f1_zero_division() {
        let c = Confusion::from_predictions(&[1, 0], &[0, 0]);
        assert_eq!(c.precision(), 0.0);
        assert_eq!(c.f1_score(), 0.0);
    }

    #[test]
    fn test_pr_curve_known_values() {
        // Reference values from the canonical precision_recall_curve example
        let labels = [0, 0, 1, 1];
        let scores = [0.1, 0.4, 0.35, 0.8];
        let curve = PrecisionRecallCurve::compute(&labels, &scores).unwrap();

        let expected_precision = [0.5, 2.0 / 3.0, 0.5, 1.0, 1.0];
        let expected_recall = [1.0, 1.0, 0.5, 0.5, 0.0];
        assert_eq!(curve.precision.len(), expected_precision.len());
        for (a, b) in curve.precision.iter().zip(expected_precision) {
            assert!(close(*a, b), "precision {a} != {b}");
        }
        for (a, b) in curve.recall.iter().zip(expected_recall) {
            assert!(close(*a, b), "recall {a} != {b}");
        }
        assert_eq!(curve.thresholds, vec![0.1, 0.35, 0.4, 0.8]);

        let expected_auc = 0.0 * (0.5 + 2.0 / 3.0) / 2.0
            + 0.5 * (2.0 / 3.0 + 0.5) / 2.0
            + 0.0 * (0.5 + 1.0) / 2.0
            + 0.5 * (1.0 + 1.0) / 2.0;
        assert!(close(curve.auc(), expected_auc));
    }

    #[test]
    fn test_pr_curve_perfect_ranking() {
        let labels = [0, 0, 1, 1];
        let scores = [0.1, 0.2, 0.8, 0.9];
        let curve = PrecisionRecallCurve::compute(&labels, &scores).unwrap();
        assert!(close(curve.auc(), 1.0));
    }

    #[test]
    fn test_pr_curve_ties_share_a_threshold() {
        let labels = [1, 0, 1, 0];
        let scores = [0.5, 0.5, 0.5, 0.5];
        let curve = PrecisionRecallCurve::compute(&labels, &scores).unwrap();
        assert_eq!(curve.thresholds, vec![0.5]);
        assert_eq!(curve.precision, vec![0.5, 1.0]);
        assert_eq!(curve.recall, vec![1.0, 0.0]);
    }

    #[test]
    fn test_pr_curve_errors() {
        assert_eq!(
            PrecisionRecallCurve::compute(&[0, 0], &[0.1, 0.2]),
            Err(EvaluationError::NoPositives)
        );
        assert_eq!(PrecisionRecallCurve::compute(&[], &[]), Err(EvaluationError::Empty));
        assert!(matches!(
            PrecisionRecallCurve::compute(&[1], &[0.1, 0.2]),
            Err(EvaluationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_evaluate() {
        let labels = [0, 0, 1, 1];
        let probabilities = [0.1, 0.6, 0.7, 0.9];
        let metrics = evaluate(&labels, &probabilities).unwrap();
        assert!(close(metrics.accuracy, 0.75));
        assert!(close(metrics.precision, 2.0 / 3.0));
        assert!(close(metrics.recall, 1.0));
        assert!(close(metrics.f1_score, 0.8));
        assert!(close(metrics.pr_auc, 1.0));
    }
}
