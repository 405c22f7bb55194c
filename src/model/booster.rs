//! Softmax gradient boosting on `gbdt` regression trees
//!
//! Each round fits one `gbdt` tree per class. A tree is trained with
//! squared error on the Newton step `g / h` with row weight `w * h`, so its
//! leaves hold `sum(w * g) / sum(w * h)`. Trees are stored
//! `rounds[round][class]`.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use gbdt::config::Loss;
use gbdt::decision_tree::{Data, DataVec, DecisionTree, TrainingCache};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encode::{rows_to_test_data, FeatureMatrix};
use crate::error::{PipelineError, Result};
use crate::pipeline::metrics::multi_logloss;

/// Probability floor used for the class priors
const PRIOR_EPS: f64 = 1e-7;
/// Hessian floor
const MIN_HESS: f64 = 1e-6;
/// Presorted-feature cache level handed to the tree learner
const CACHE_LEVEL: u8 = 2;
/// Rows scored per parallel prediction chunk
const PREDICT_CHUNK: usize = 1024;
/// Rows scored for permutation importance
const IMPORTANCE_ROWS: usize = 5000;

/// Hyperparameters of the boosting loop and its trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    pub learning_rate: f64,
    pub max_depth: u32,
    /// Minimum rows in a leaf
    pub min_child_samples: usize,
    /// Fraction of rows sampled per round
    pub subsample: f64,
    /// Bound on a single tree's output before shrinkage
    pub max_delta_step: f64,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            max_depth: 6,
            min_child_samples: 50,
            subsample: 0.8,
            max_delta_step: 4.0,
            seed: 42,
        }
    }
}

impl BoosterParams {
    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(PipelineError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_depth == 0 {
            return Err(PipelineError::Config("max_depth must be at least 1".to_string()));
        }
        if self.min_child_samples == 0 {
            return Err(PipelineError::Config(
                "min_child_samples must be at least 1".to_string(),
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(PipelineError::Config(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        if !self.max_delta_step.is_finite() || self.max_delta_step <= 0.0 {
            return Err(PipelineError::Config(format!(
                "max_delta_step must be positive, got {}",
                self.max_delta_step
            )));
        }
        Ok(())
    }

    fn new_tree(&self, num_features: usize) -> DecisionTree {
        let mut tree = DecisionTree::new();
        tree.set_feature_size(num_features);
        tree.set_max_depth(self.max_depth);
        tree.set_min_leaf_size(self.min_child_samples);
        tree.set_loss(Loss::SquaredError);
        tree
    }
}

/// Training rows for one fit
#[derive(Debug, Clone, Copy)]
pub struct FitData<'a> {
    pub matrix: &'a FeatureMatrix,
    /// Dense class indices
    pub labels: &'a [usize],
    /// Per-row weights; `None` weighs every row 1.0
    pub weights: Option<&'a [f64]>,
}

/// Round budget and early stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitOptions {
    pub num_classes: usize,
    pub max_rounds: usize,
    /// Stop after this many rounds without a validation improvement
    pub early_stopping_rounds: Option<usize>,
}

#[derive(Debug)]
pub struct FitResult {
    /// Truncated to `best_iteration` rounds
    pub booster: Booster,
    /// Number of rounds with the lowest validation loss (all rounds without validation)
    pub best_iteration: usize,
    /// Validation multi-logloss after each round
    pub valid_loss: Vec<f64>,
}

/// Tracks the best validation loss and signals when to stop
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_loss: f64,
    best_round: usize,
    rounds_seen: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_loss: f64::INFINITY,
            best_round: 0,
            rounds_seen: 0,
        }
    }

    /// Record the loss of the next round; returns true when training should stop.
    pub fn update(&mut self, loss: f64) -> bool {
        self.rounds_seen += 1;
        if loss < self.best_loss {
            self.best_loss = loss;
            self.best_round = self.rounds_seen;
        }
        self.patience > 0 && self.rounds_seen - self.best_round >= self.patience
    }

    /// 1-based round with the lowest loss
    pub fn best_round(&self) -> usize {
        self.best_round
    }
}

/// Multiclass tree ensemble
#[derive(Serialize, Deserialize)]
pub struct Booster {
    pub num_classes: usize,
    pub num_features: usize,
    pub learning_rate: f64,
    pub max_delta_step: f64,
    pub base_scores: Vec<f64>,
    pub rounds: Vec<Vec<DecisionTree>>,
}

impl fmt::Debug for Booster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Booster")
            .field("num_classes", &self.num_classes)
            .field("num_features", &self.num_features)
            .field("learning_rate", &self.learning_rate)
            .field("base_scores", &self.base_scores)
            .field("rounds", &self.rounds.len())
            .finish()
    }
}

impl Booster {
    pub fn fit(
        train: FitData<'_>,
        valid: Option<(&FeatureMatrix, &[usize])>,
        params: &BoosterParams,
        options: &FitOptions,
    ) -> Result<FitResult> {
        params.validate()?;
        let k = options.num_classes;
        let n = train.matrix.n_rows();
        if k < 2 {
            return Err(PipelineError::NotEnoughClasses { found: k });
        }
        if n == 0 || train.labels.len() != n {
            return Err(PipelineError::Config(format!(
                "training needs one label per row, got {} labels for {} rows",
                train.labels.len(),
                n
            )));
        }
        if let Some(&bad) = train.labels.iter().find(|&&l| l >= k) {
            return Err(PipelineError::Config(format!(
                "class index {} out of range for {} classes",
                bad, k
            )));
        }

        let uniform;
        let weights = match train.weights {
            Some(w) if w.len() == n => w,
            Some(w) => {
                return Err(PipelineError::Config(format!(
                    "got {} weights for {} rows",
                    w.len(),
                    n
                )))
            }
            None => {
                uniform = vec![1.0; n];
                uniform.as_slice()
            }
        };

        let num_features = train.matrix.n_features();
        let base_scores = log_priors(train.labels, weights, k);
        let mut booster = Booster {
            num_classes: k,
            num_features,
            learning_rate: params.learning_rate,
            max_delta_step: params.max_delta_step,
            base_scores: base_scores.clone(),
            rounds: Vec::new(),
        };

        let mut data: DataVec = train
            .matrix
            .rows()
            .iter()
            .map(|row| Data::new_training_data(row.clone(), 1.0, 0.0, None))
            .collect();
        let mut cache = TrainingCache::get_cache(num_features, &data, CACHE_LEVEL);
        let valid_data = valid.map(|(m, _)| m.to_test_data());

        let mut train_raw: Vec<f64> = base_scores.iter().copied().cycle().take(n * k).collect();
        let mut valid_raw: Vec<f64> = valid
            .map(|(m, _)| base_scores.iter().copied().cycle().take(m.n_rows() * k).collect())
            .unwrap_or_default();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n_sample = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let mut stopper = options.early_stopping_rounds.map(EarlyStopping::new);
        let mut valid_loss = Vec::new();
        // softmax Newton steps are scaled by (k - 1) / k
        let factor = k as f64 / (k as f64 - 1.0);

        for round in 0..options.max_rounds {
            let probs: Vec<f64> = train_raw.par_chunks(k).flat_map_iter(softmax).collect();

            let mut subset: Vec<usize> = if n_sample < n {
                index::sample(&mut rng, n, n_sample).into_vec()
            } else {
                (0..n).collect()
            };
            subset.sort_unstable();

            let mut round_trees = Vec::with_capacity(k);
            for class in 0..k {
                for (r, row) in data.iter_mut().enumerate() {
                    let p = probs[r * k + class];
                    let y = if train.labels[r] == class { 1.0 } else { 0.0 };
                    let h = (factor * p * (1.0 - p)).max(MIN_HESS);
                    row.target = ((y - p) / h) as f32;
                    row.residual = row.target;
                    row.weight = (weights[r] * h) as f32;
                }
                let mut tree = params.new_tree(num_features);
                tree.fit_n(&data, &subset, &mut cache);
                booster.add_tree_scores(&tree, &data, class, &mut train_raw);
                if let Some(valid_data) = &valid_data {
                    booster.add_tree_scores(&tree, valid_data, class, &mut valid_raw);
                }
                round_trees.push(tree);
            }
            booster.rounds.push(round_trees);

            if let Some((_, valid_labels)) = valid {
                let valid_probs: Vec<Vec<f64>> = valid_raw.par_chunks(k).map(softmax).collect();
                let loss = multi_logloss(&valid_probs, valid_labels);
                valid_loss.push(loss);
                debug!(round = round + 1, valid_logloss = loss, "Boosting round");

                if let Some(stopper) = stopper.as_mut() {
                    if stopper.update(loss) {
                        debug!(
                            round = round + 1,
                            best = stopper.best_round(),
                            "Early stopping"
                        );
                        break;
                    }
                }
            }
        }

        let best_iteration = match (&stopper, valid.is_some()) {
            (Some(s), true) => s.best_round().max(1),
            (None, true) => valid_loss
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i + 1)
                .unwrap_or(options.max_rounds),
            _ => booster.n_rounds(),
        };
        booster.truncate(best_iteration);

        Ok(FitResult {
            booster,
            best_iteration,
            valid_loss,
        })
    }

    /// Shrunken, bounded output of one tree
    fn tree_step(&self, value: f32) -> f64 {
        self.learning_rate * (value as f64).clamp(-self.max_delta_step, self.max_delta_step)
    }

    fn add_tree_scores(&self, tree: &DecisionTree, data: &DataVec, class: usize, raw: &mut [f64]) {
        let k = self.num_classes;
        for (row, value) in tree.predict(data).into_iter().enumerate() {
            raw[row * k + class] += self.tree_step(value);
        }
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Keep only the first `rounds` rounds.
    pub fn truncate(&mut self, rounds: usize) {
        self.rounds.truncate(rounds);
    }

    /// Check the ensemble's shape before it is used for scoring.
    pub fn validate(&self) -> Result<()> {
        if self.num_classes < 2 {
            return Err(PipelineError::Artifact(format!(
                "ensemble needs at least 2 classes, got {}",
                self.num_classes
            )));
        }
        if self.base_scores.len() != self.num_classes {
            return Err(PipelineError::Artifact(format!(
                "{} base scores for {} classes",
                self.base_scores.len(),
                self.num_classes
            )));
        }
        if let Some(score) = self.base_scores.iter().find(|s| !s.is_finite()) {
            return Err(PipelineError::Artifact(format!(
                "base score {} is not finite",
                score
            )));
        }
        if let Some((round, trees)) = self
            .rounds
            .iter()
            .enumerate()
            .find(|(_, trees)| trees.len() != self.num_classes)
        {
            return Err(PipelineError::Artifact(format!(
                "round {} has {} trees for {} classes",
                round + 1,
                trees.len(),
                self.num_classes
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(PipelineError::Artifact(format!(
                "learning rate {} is not positive",
                self.learning_rate
            )));
        }
        if !self.max_delta_step.is_finite() || self.max_delta_step <= 0.0 {
            return Err(PipelineError::Artifact(format!(
                "max delta step {} is not positive",
                self.max_delta_step
            )));
        }
        Ok(())
    }

    fn check_width(&self, matrix: &FeatureMatrix) -> Result<()> {
        if matrix.n_features() != self.num_features {
            return Err(PipelineError::Artifact(format!(
                "model expects {} features, got {}",
                self.num_features,
                matrix.n_features()
            )));
        }
        Ok(())
    }

    fn score_chunk(&self, rows: &[Vec<f32>]) -> Vec<Vec<f64>> {
        let data = rows_to_test_data(rows);
        let k = self.num_classes;
        let mut raw: Vec<f64> = self.base_scores.iter().copied().cycle().take(rows.len() * k).collect();
        for trees in &self.rounds {
            for (class, tree) in trees.iter().enumerate() {
                self.add_tree_scores(tree, &data, class, &mut raw);
            }
        }
        raw.chunks(k).map(<[f64]>::to_vec).collect()
    }

    /// Raw scores `[row][class]`
    ///
    /// A panic inside the tree learner's prediction is reported as
    /// [`PipelineError::Inference`].
    pub fn predict_raw(&self, matrix: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        self.validate()?;
        self.check_width(matrix)?;
        let scored = panic::catch_unwind(AssertUnwindSafe(|| {
            matrix
                .rows()
                .par_chunks(PREDICT_CHUNK)
                .flat_map_iter(|chunk| self.score_chunk(chunk))
                .collect::<Vec<_>>()
        }));
        scored.map_err(|payload| PipelineError::Inference {
            kind: "Panic".to_string(),
            message: panic_message(payload.as_ref()),
        })
    }

    /// Class probabilities `[row][class]`
    pub fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        Ok(self
            .predict_raw(matrix)?
            .into_par_iter()
            .map(|raw| softmax(&raw))
            .collect())
    }

    /// Most probable dense class index per row
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<usize>> {
        Ok(self
            .predict_raw(matrix)?
            .iter()
            .map(|raw| argmax(raw))
            .collect())
    }

    /// Permutation importance per feature index.
    ///
    /// The score of a feature is the rise in multi-logloss over `labels`
    /// when that feature's column is shuffled. Rows beyond 5000 are
    /// subsampled with `seed`.
    pub fn permutation_importance(
        &self,
        matrix: &FeatureMatrix,
        labels: &[usize],
        seed: u64,
    ) -> Result<Vec<f64>> {
        if labels.len() != matrix.n_rows() {
            return Err(PipelineError::Config(format!(
                "got {} labels for {} rows",
                labels.len(),
                matrix.n_rows()
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let (sample, sample_labels) = if matrix.n_rows() > IMPORTANCE_ROWS {
            let mut rows = index::sample(&mut rng, matrix.n_rows(), IMPORTANCE_ROWS).into_vec();
            rows.sort_unstable();
            let sample_labels: Vec<usize> = rows.iter().map(|&r| labels[r]).collect();
            (matrix.select_rows(&rows), sample_labels)
        } else {
            (matrix.clone(), labels.to_vec())
        };

        let baseline = multi_logloss(&self.predict_proba(&sample)?, &sample_labels);
        let orders: Vec<Vec<usize>> = (0..sample.n_features())
            .map(|_| {
                let mut order: Vec<usize> = (0..sample.n_rows()).collect();
                order.shuffle(&mut rng);
                order
            })
            .collect();

        orders
            .par_iter()
            .enumerate()
            .map(|(feature, order)| {
                let permuted = sample.with_permuted_feature(feature, order);
                let loss = multi_logloss(&self.predict_proba(&permuted)?, &sample_labels);
                Ok(loss - baseline)
            })
            .collect()
    }

    /// Compact single-line form of the ensemble.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let booster: Self = serde_json::from_str(text.trim())?;
        booster.validate()?;
        Ok(booster)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "tree prediction panicked".to_string())
}

/// Weighted log class frequencies
fn log_priors(labels: &[usize], weights: &[f64], k: usize) -> Vec<f64> {
    let mut mass = vec![0.0; k];
    for (&label, &w) in labels.iter().zip(weights) {
        mass[label] += w;
    }
    let total: f64 = mass.iter().sum();
    mass.iter()
        .map(|m| (m / total).max(PRIOR_EPS).ln())
        .collect()
}

pub fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = raw.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; ties go to the lower index.
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}
