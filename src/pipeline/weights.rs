//! Class-imbalance weighting
//!
//! Two interchangeable schemes derived from label frequency. Only one is
//! active per training run and neither is ever applied at inference.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::target::class_counts;

/// Offset inside the logarithm of the inverse-log scheme
const LOG_OFFSET: f64 = 1.2;

/// Weighting scheme used during training
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassWeighting {
    /// Every row weighs 1.0
    None,
    /// Row weights `1/sqrt(count)`, normalized so the largest weight is 1.0
    #[default]
    InverseSqrt,
    /// Class weights `1 / ln(1.2 + relative_frequency)`
    InverseLog,
}

impl std::fmt::Display for ClassWeighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassWeighting::None => write!(f, "none"),
            ClassWeighting::InverseSqrt => write!(f, "inverse-sqrt"),
            ClassWeighting::InverseLog => write!(f, "inverse-log"),
        }
    }
}

impl std::str::FromStr for ClassWeighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(ClassWeighting::None),
            "inverse-sqrt" | "sqrt" => Ok(ClassWeighting::InverseSqrt),
            "inverse-log" | "log" => Ok(ClassWeighting::InverseLog),
            _ => Err(format!(
                "Unknown weighting: '{}'. Use 'none', 'inverse-sqrt' or 'inverse-log'.",
                s
            )),
        }
    }
}

/// Per-row weights `(1/sqrt(count_c)) / max_c(1/sqrt(count_c))`.
///
/// Every weight lies in (0, 1]; the least frequent class gets exactly 1.0.
pub fn inverse_sqrt_sample_weights(labels: &[i64]) -> Vec<f64> {
    let raw: BTreeMap<i64, f64> = class_counts(labels)
        .into_iter()
        .map(|(class, count)| (class, 1.0 / (count as f64).sqrt()))
        .collect();

    let max_w = raw.values().copied().fold(0.0, f64::max);
    if max_w == 0.0 {
        return Vec::new();
    }

    labels.iter().map(|label| raw[label] / max_w).collect()
}

/// Per-class weights `1 / ln(1.2 + count_c / total)`.
pub fn inverse_log_class_weights(labels: &[i64]) -> BTreeMap<i64, f64> {
    let total = labels.len() as f64;
    class_counts(labels)
        .into_iter()
        .map(|(class, count)| (class, 1.0 / (LOG_OFFSET + count as f64 / total).ln()))
        .collect()
}

/// Expand a weighting scheme into one weight per row.
pub fn sample_weights(labels: &[i64], weighting: ClassWeighting) -> Vec<f64> {
    match weighting {
        ClassWeighting::None => vec![1.0; labels.len()],
        ClassWeighting::InverseSqrt => inverse_sqrt_sample_weights(labels),
        ClassWeighting::InverseLog => {
            let class_weights = inverse_log_class_weights(labels);
            labels.iter().map(|label| class_weights[label]).collect()
        }
    }
}

/// Calculate the total weight (sum of all weights).
#[inline]
pub fn total_weight(weights: &[f64]) -> f64 {
    weights.iter().sum()
}
