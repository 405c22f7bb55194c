//! Classification quality metrics

use std::collections::{BTreeMap, BTreeSet};

/// Probability floor for log-loss
const EPS: f64 = 1e-15;

/// F1 score per class over the union of true and predicted labels.
///
/// A class with no true and no predicted rows cannot appear; a class with
/// zero precision and recall scores 0.0.
pub fn per_class_f1(y_true: &[i64], y_pred: &[i64]) -> BTreeMap<i64, f64> {
    let classes: BTreeSet<i64> = y_true.iter().chain(y_pred.iter()).copied().collect();

    classes
        .into_iter()
        .map(|class| {
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_ = 0usize;
            for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                match (t == class, p == class) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let denom = 2 * tp + fp + fn_;
            let f1 = if denom == 0 {
                0.0
            } else {
                2.0 * tp as f64 / denom as f64
            };
            (class, f1)
        })
        .collect()
}

/// Unweighted mean of per-class F1 scores.
pub fn macro_f1(y_true: &[i64], y_pred: &[i64]) -> f64 {
    let scores = per_class_f1(y_true, y_pred);
    if scores.is_empty() {
        return 0.0;
    }
    scores.values().sum::<f64>() / scores.len() as f64
}

pub fn accuracy(y_true: &[i64], y_pred: &[i64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    hits as f64 / y_true.len() as f64
}

/// Mean multiclass log-loss. `probs[row][class]`, `labels` are dense indices.
pub fn multi_logloss(probs: &[Vec<f64>], labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = probs
        .iter()
        .zip(labels)
        .map(|(row, &label)| -row[label].clamp(EPS, 1.0 - EPS).ln())
        .sum();
    total / labels.len() as f64
}

/// Population mean and standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = vec![0, 1, 2, 2];
        assert_eq!(macro_f1(&y, &y), 1.0);
        assert_eq!(accuracy(&y, &y), 1.0);
    }

    #[test]
    fn test_macro_f1_penalizes_ignored_minority() {
        let y_true = vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 1];
        let y_pred = vec![0; 10];
        // class 0: p=0.8 r=1 -> f1=8/9; class 1: 0
        let f1 = macro_f1(&y_true, &y_pred);
        assert!((f1 - (8.0 / 9.0) / 2.0).abs() < 1e-12);
        assert!(accuracy(&y_true, &y_pred) > f1);
    }

    #[test]
    fn test_per_class_includes_predicted_only_classes() {
        let scores = per_class_f1(&[0, 0], &[0, 3]);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[&3], 0.0);
    }

    #[test]
    fn test_logloss() {
        let probs = vec![vec![0.5, 0.5], vec![1.0, 0.0]];
        let loss = multi_logloss(&probs, &[0, 0]);
        assert!((loss - (2.0f64.ln() / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[1.0, 3.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 1.0);
    }
}
