//! Row-major feature encoding for the tree learner
//!
//! Numeric columns are cast to `f32`. Categorical columns are replaced by
//! their index in a sorted per-column vocabulary. Missing values and unseen
//! categories both become [`MISSING`].

use std::collections::{BTreeMap, BTreeSet};

use gbdt::decision_tree::{Data, DataVec};
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Ordered category list per categorical feature
pub type Vocabularies = BTreeMap<String, Vec<String>>;

/// Missing values sort below every observed value.
pub const MISSING: f32 = f32::MIN;

/// Largest vocabulary whose codes `f32` still represents exactly (2^24)
pub const MAX_CATEGORIES: usize = 1 << 24;

/// Dense features in a fixed column order, one `Vec<f32>` per row
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    rows: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, rows: Vec<Vec<f32>>) -> Result<Self> {
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
            return Err(PipelineError::Config(format!(
                "row {} has {} values for {} features",
                row,
                values.len(),
                names.len()
            )));
        }
        Ok(Self { names, rows })
    }

    /// Build a matrix from `names` in order. Columns listed in `categorical`
    /// are encoded through `vocabularies`; every other column is cast to f32.
    pub fn from_frame(
        df: &DataFrame,
        names: &[String],
        categorical: &[String],
        vocabularies: &Vocabularies,
    ) -> Result<Self> {
        let mut rows = vec![Vec::with_capacity(names.len()); df.height()];
        for name in names {
            let column = df
                .column(name)
                .map_err(|_| PipelineError::missing_column(name.as_str()))?;
            let values = if categorical.contains(name) {
                let vocab = vocabularies.get(name).map(Vec::as_slice).unwrap_or(&[]);
                encode_categories(name, column, vocab)?
            } else {
                let floats = column.cast(&DataType::Float64)?;
                floats
                    .f64()?
                    .iter()
                    .map(|v| v.map_or(MISSING, |v| v as f32))
                    .collect()
            };
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Self::new(names.to_vec(), rows)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Copy of the matrix restricted to `rows`, in that order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            rows: rows.iter().map(|&r| self.rows[r].clone()).collect(),
        }
    }

    /// Copy with `feature` rearranged by `order`, a permutation of the rows.
    pub fn with_permuted_feature(&self, feature: usize, order: &[usize]) -> Self {
        let mut rows = self.rows.clone();
        for (row, &source) in rows.iter_mut().zip(order) {
            row[feature] = self.rows[source][feature];
        }
        Self {
            names: self.names.clone(),
            rows,
        }
    }

    /// Rows as unlabelled prediction input
    pub fn to_test_data(&self) -> DataVec {
        rows_to_test_data(&self.rows)
    }
}

pub fn rows_to_test_data(rows: &[Vec<f32>]) -> DataVec {
    rows.iter()
        .map(|row| Data::new_test_data(row.clone(), None))
        .collect()
}

fn encode_categories(name: &str, column: &Column, vocab: &[String]) -> Result<Vec<f32>> {
    check_vocabulary_size(name, vocab.len())?;
    let strings = column.cast(&DataType::String)?;
    let codes = strings
        .str()?
        .iter()
        .map(|value| {
            value
                .and_then(|s| vocab.binary_search_by(|entry| entry.as_str().cmp(s)).ok())
                .map_or(MISSING, |idx| idx as f32)
        })
        .collect();
    Ok(codes)
}

fn check_vocabulary_size(name: &str, size: usize) -> Result<()> {
    if size > MAX_CATEGORIES {
        return Err(PipelineError::Config(format!(
            "categorical feature '{}' has {} distinct values, at most {} are supported",
            name, size, MAX_CATEGORIES
        )));
    }
    Ok(())
}

/// Learn a sorted vocabulary for each categorical column.
pub fn learn_vocabularies(df: &DataFrame, categorical: &[String]) -> Result<Vocabularies> {
    categorical
        .iter()
        .map(|name| {
            let column = df
                .column(name)
                .map_err(|_| PipelineError::missing_column(name.as_str()))?;
            let strings = column.cast(&DataType::String)?;
            let values: BTreeSet<String> = strings
                .str()?
                .iter()
                .flatten()
                .map(str::to_string)
                .collect();
            check_vocabulary_size(name, values.len())?;
            Ok((name.clone(), values.into_iter().collect()))
        })
        .collect()
}
