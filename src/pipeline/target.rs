//! Label distribution analysis and rare-class folding
//!
//! Classes with only a handful of rows make stratified folds unstable. Before
//! training, each such class is folded into the nearest class that has enough
//! rows. The fold is training-internal: the artifact keeps the full label
//! space, and every served prediction is a real bundle id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Row counts per class, ordered by class id
pub type ClassCounts = BTreeMap<i64, usize>;

/// Count rows per class
pub fn class_counts(labels: &[i64]) -> ClassCounts {
    let mut counts = ClassCounts::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Check that labels describe a learnable problem (at least two classes).
pub fn validate_labels(labels: &[i64]) -> Result<ClassCounts> {
    let counts = class_counts(labels);
    if counts.len() < 2 {
        return Err(PipelineError::NotEnoughClasses {
            found: counts.len(),
        });
    }
    Ok(counts)
}

/// Mapping from original class ids to the ids used for training
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRemap {
    /// Rare class -> class it was folded into
    pub folded: BTreeMap<i64, i64>,
}

impl ClassRemap {
    /// Remap that leaves every label untouched
    pub fn identity() -> Self {
        Self::default()
    }

    /// Fold every class with fewer than `min_count` rows into the nearest
    /// class id that meets the minimum. Ties go to the lower id.
    ///
    /// `min_count == 0` disables folding.
    pub fn fold_rare(labels: &[i64], min_count: usize) -> Result<Self> {
        if min_count == 0 {
            return Ok(Self::identity());
        }

        let counts = class_counts(labels);
        let anchors: Vec<i64> = counts
            .iter()
            .filter(|(_, &count)| count >= min_count)
            .map(|(&class, _)| class)
            .collect();

        let rare: Vec<i64> = counts
            .iter()
            .filter(|(_, &count)| count < min_count)
            .map(|(&class, _)| class)
            .collect();

        if rare.is_empty() {
            return Ok(Self::identity());
        }
        if anchors.is_empty() {
            return Err(PipelineError::NoClassMeetsMinimum { min_count });
        }

        let folded = rare
            .into_iter()
            .map(|class| {
                let target = anchors
                    .iter()
                    .copied()
                    .min_by_key(|anchor| ((anchor - class).abs(), *anchor))
                    .unwrap_or(class);
                (class, target)
            })
            .collect();

        Ok(Self { folded })
    }

    pub fn is_identity(&self) -> bool {
        self.folded.is_empty()
    }

    pub fn map(&self, label: i64) -> i64 {
        self.folded.get(&label).copied().unwrap_or(label)
    }

    pub fn apply(&self, labels: &[i64]) -> Vec<i64> {
        labels.iter().map(|&l| self.map(l)).collect()
    }
}

/// Dense class indexing used by the booster.
///
/// `labels[i]` is the bundle id predicted when the booster picks class `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassIndex {
    pub labels: Vec<i64>,
}

impl ClassIndex {
    pub fn from_labels(labels: &[i64]) -> Self {
        Self {
            labels: class_counts(labels).into_keys().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Encode labels to dense indices. Labels outside the index are an error.
    pub fn encode(&self, labels: &[i64]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                self.labels.binary_search(label).map_err(|_| PipelineError::InvalidLabel {
                    column: super::schema::TARGET_COLUMN.to_string(),
                    reason: format!("class {} is not part of the trained label set", label),
                })
            })
            .collect()
    }

    pub fn decode(&self, index: usize) -> i64 {
        self.labels[index]
    }
}
