//! Stratified validation splits
//!
//! Both splitters group row indices by class, shuffle each group with a
//! seeded RNG, and deal the groups out so every split keeps the class
//! proportions of the full table.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Row indices of one train/validation partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// How the trainer picks its stopping point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ValidationStrategy {
    /// Stratified k-fold; the round count is averaged over folds.
    KFold { folds: usize },
    /// Single stratified holdout slice.
    Holdout { fraction: f64 },
}

impl Default for ValidationStrategy {
    fn default() -> Self {
        ValidationStrategy::KFold { folds: 5 }
    }
}

impl ValidationStrategy {
    pub fn splits(&self, labels: &[i64], seed: u64) -> Result<Vec<Split>> {
        match *self {
            ValidationStrategy::KFold { folds } => stratified_kfold(labels, folds, seed),
            ValidationStrategy::Holdout { fraction } => {
                Ok(vec![stratified_holdout(labels, fraction, seed)?])
            }
        }
    }
}

impl std::fmt::Display for ValidationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStrategy::KFold { folds } => write!(f, "{}-fold stratified", folds),
            ValidationStrategy::Holdout { fraction } => {
                write!(f, "stratified holdout ({:.0}%)", fraction * 100.0)
            }
        }
    }
}

/// Group row indices by class, each group shuffled.
///
/// Fails when a class cannot appear on both sides of a split.
fn shuffled_groups(labels: &[i64], seed: u64) -> Result<BTreeMap<i64, Vec<usize>>> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(row);
    }

    if let Some((&class, rows)) = groups.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(PipelineError::Unstratifiable {
            class,
            count: rows.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    for rows in groups.values_mut() {
        rows.shuffle(&mut rng);
    }
    Ok(groups)
}

/// Stratified k-fold with shuffling.
pub fn stratified_kfold(labels: &[i64], folds: usize, seed: u64) -> Result<Vec<Split>> {
    if folds < 2 {
        return Err(PipelineError::Config(format!(
            "k-fold validation needs at least 2 folds, got {}",
            folds
        )));
    }
    if labels.len() < folds {
        return Err(PipelineError::Config(format!(
            "{} rows cannot be split into {} folds",
            labels.len(),
            folds
        )));
    }

    let groups = shuffled_groups(labels, seed)?;
    let mut fold_rows: Vec<Vec<usize>> = vec![Vec::new(); folds];

    // Continue dealing where the previous class stopped so small classes do
    // not all land in the first fold.
    let mut next_fold = 0;
    for rows in groups.values() {
        for &row in rows {
            fold_rows[next_fold].push(row);
            next_fold = (next_fold + 1) % folds;
        }
    }

    let splits = (0..folds)
        .map(|k| {
            let mut valid = fold_rows[k].clone();
            valid.sort_unstable();
            let mut train: Vec<usize> = fold_rows
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            train.sort_unstable();
            Split { train, valid }
        })
        .collect();

    Ok(splits)
}

/// Single stratified holdout holding out about `fraction` of every class.
///
/// Each class keeps at least one row on each side.
pub fn stratified_holdout(labels: &[i64], fraction: f64, seed: u64) -> Result<Split> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(PipelineError::Config(format!(
            "holdout fraction must be in (0, 1), got {}",
            fraction
        )));
    }

    let groups = shuffled_groups(labels, seed)?;
    let mut train = Vec::with_capacity(labels.len());
    let mut valid = Vec::new();

    for rows in groups.values() {
        let n_valid = ((rows.len() as f64 * fraction).round() as usize).clamp(1, rows.len() - 1);
        valid.extend_from_slice(&rows[..n_valid]);
        train.extend_from_slice(&rows[n_valid..]);
    }

    train.sort_unstable();
    valid.sort_unstable();
    Ok(Split { train, valid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::target::class_counts;

    fn labels() -> Vec<i64> {
        let mut labels = vec![0; 50];
        labels.extend(vec![1; 30]);
        labels.extend(vec![2; 10]);
        labels.extend(vec![3; 3]);
        labels
    }

    fn pick(labels: &[i64], rows: &[usize]) -> Vec<i64> {
        rows.iter().map(|&r| labels[r]).collect()
    }

    #[test]
    fn test_kfold_partitions_all_rows() {
        let labels = labels();
        let splits = stratified_kfold(&labels, 5, 42).unwrap();
        assert_eq!(splits.len(), 5);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.valid.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..labels.len()).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train.len() + split.valid.len(), labels.len());
        }
    }

    #[test]
    fn test_kfold_preserves_proportions() {
        let labels = labels();
        for split in stratified_kfold(&labels, 5, 7).unwrap() {
            let counts = class_counts(&pick(&labels, &split.valid));
            assert_eq!(counts[&0], 10);
            assert_eq!(counts[&1], 6);
            assert_eq!(counts[&2], 2);
        }
    }

    #[test]
    fn test_kfold_is_deterministic() {
        let labels = labels();
        assert_eq!(
            stratified_kfold(&labels, 4, 1).unwrap(),
            stratified_kfold(&labels, 4, 1).unwrap()
        );
    }

    #[test]
    fn test_holdout_keeps_every_class_on_both_sides() {
        let labels = labels();
        let split = stratified_holdout(&labels, 0.2, 42).unwrap();
        let train = class_counts(&pick(&labels, &split.train));
        let valid = class_counts(&pick(&labels, &split.valid));
        assert_eq!(train.len(), 4);
        assert_eq!(valid.len(), 4);
        assert_eq!(valid[&0], 10);
        assert_eq!(valid[&3], 1);
    }

    #[test]
    fn test_singleton_class_is_unstratifiable() {
        let result = stratified_holdout(&[0, 0, 0, 1], 0.25, 42);
        assert!(matches!(result, Err(PipelineError::Unstratifiable { class: 1, count: 1 })));
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        assert!(stratified_holdout(&labels(), 1.0, 42).is_err());
        assert!(stratified_kfold(&labels(), 1, 42).is_err());
    }
}
