//! Model training: clean, fold rare classes, validate, refit
//!
//! Validation only decides how many boosting rounds the final model gets.
//! The persisted model is always refit on every row.

use polars::prelude::*;
use tracing::{debug, info};

use super::cleaner::{clean_with, has_column};
use super::features::{engineer, extract_labels, feature_columns};
use super::metrics::{macro_f1, mean_std};
use super::schema::{SchemaVersion, TARGET_COLUMN};
use super::split::ValidationStrategy;
use super::target::{validate_labels, ClassIndex, ClassRemap};
use super::weights::{sample_weights, ClassWeighting};
use crate::error::{PipelineError, Result};
use crate::model::artifact::{
    ArtifactMetadata, FeatureImportance, ModelArtifact, ModelHeader, TrainingReport,
    FORMAT_VERSION,
};
use crate::model::booster::{Booster, BoosterParams, FitData, FitOptions};
use crate::model::encode::{learn_vocabularies, FeatureMatrix, Vocabularies};
use crate::utils::{create_progress_bar, finish_with_success};

/// Training configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub schema_version: SchemaVersion,
    pub weighting: ClassWeighting,
    pub validation: ValidationStrategy,
    /// Classes with fewer rows are folded into a neighbour; 0 disables
    pub min_class_count: usize,
    pub max_rounds: usize,
    /// Early-stopping patience in rounds
    pub patience: usize,
    /// Rounds added to the validated round count for the final refit
    pub iteration_margin: usize,
    /// Seed for splits; also used as the booster seed
    pub seed: u64,
    pub booster: BoosterParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            schema_version: SchemaVersion::default(),
            weighting: ClassWeighting::default(),
            validation: ValidationStrategy::default(),
            min_class_count: 10,
            max_rounds: 200,
            patience: 30,
            iteration_margin: 10,
            seed: 42,
            booster: BoosterParams::default(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(PipelineError::Config("max_rounds must be at least 1".to_string()));
        }
        self.booster.validate()
    }

    fn booster_params(&self) -> BoosterParams {
        BoosterParams {
            seed: self.seed,
            ..self.booster.clone()
        }
    }
}

/// Result of one validation split
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub fold: usize,
    pub train_rows: usize,
    pub valid_rows: usize,
    pub best_iteration: usize,
    pub macro_f1: f64,
    pub best_valid_loss: f64,
}

#[derive(Debug)]
pub struct TrainOutcome {
    pub artifact: ModelArtifact,
    pub folds: Vec<FoldOutcome>,
    pub report: TrainingReport,
}

/// The cleaned table split into what the booster sees
struct Prepared {
    matrix: FeatureMatrix,
    feature_names: Vec<String>,
    categorical: Vec<String>,
    vocabularies: Vocabularies,
    labels: Vec<i64>,
}

fn prepare(df: &DataFrame, schema: SchemaVersion) -> Result<Prepared> {
    if !has_column(df, TARGET_COLUMN) {
        return Err(PipelineError::missing_column(TARGET_COLUMN));
    }

    let mut cleaned = clean_with(df, schema)?;
    if schema.engineers_features() {
        cleaned = engineer(&cleaned)?;
    }

    let labels = extract_labels(&cleaned)?;
    let (feature_names, categorical) = feature_columns(&cleaned);
    if feature_names.is_empty() {
        return Err(PipelineError::Config("no feature columns left after cleaning".to_string()));
    }
    let vocabularies = learn_vocabularies(&cleaned, &categorical)?;
    let matrix = FeatureMatrix::from_frame(&cleaned, &feature_names, &categorical, &vocabularies)?;

    Ok(Prepared {
        matrix,
        feature_names,
        categorical,
        vocabularies,
        labels,
    })
}

/// Train a model on a raw policy table.
pub fn train(df: &DataFrame, config: &TrainConfig) -> Result<TrainOutcome> {
    config.validate()?;
    let prepared = prepare(df, config.schema_version)?;

    let counts_before = validate_labels(&prepared.labels)?;
    let remap = ClassRemap::fold_rare(&prepared.labels, config.min_class_count)?;
    let effective = remap.apply(&prepared.labels);
    let counts_after = validate_labels(&effective)?;
    for (from, to) in &remap.folded {
        info!(from, to, rows = counts_before[from], "Folded rare class");
    }

    let index = ClassIndex::from_labels(&effective);
    let encoded = index.encode(&effective)?;
    let params = config.booster_params();

    let splits = config.validation.splits(&effective, config.seed)?;
    let pb = create_progress_bar(splits.len() as u64, "Validating");
    let mut folds = Vec::with_capacity(splits.len());

    for (fold, split) in splits.iter().enumerate() {
        let train_matrix = prepared.matrix.select_rows(&split.train);
        let valid_matrix = prepared.matrix.select_rows(&split.valid);
        let train_labels: Vec<usize> = split.train.iter().map(|&r| encoded[r]).collect();
        let valid_labels: Vec<usize> = split.valid.iter().map(|&r| encoded[r]).collect();
        let fold_effective: Vec<i64> = split.train.iter().map(|&r| effective[r]).collect();
        let weights = sample_weights(&fold_effective, config.weighting);

        let fit = Booster::fit(
            FitData {
                matrix: &train_matrix,
                labels: &train_labels,
                weights: Some(&weights),
            },
            Some((&valid_matrix, &valid_labels)),
            &params,
            &FitOptions {
                num_classes: index.len(),
                max_rounds: config.max_rounds,
                early_stopping_rounds: Some(config.patience),
            },
        )?;

        let predicted: Vec<i64> = fit
            .booster
            .predict(&valid_matrix)?
            .into_iter()
            .map(|i| index.decode(i))
            .collect();
        let truth: Vec<i64> = split.valid.iter().map(|&r| effective[r]).collect();
        let score = macro_f1(&truth, &predicted);
        let best_valid_loss = fit
            .valid_loss
            .get(fit.best_iteration.saturating_sub(1))
            .copied()
            .unwrap_or(f64::NAN);

        info!(
            fold = fold + 1,
            best_iteration = fit.best_iteration,
            macro_f1 = score,
            "Fold complete"
        );
        folds.push(FoldOutcome {
            fold: fold + 1,
            train_rows: split.train.len(),
            valid_rows: split.valid.len(),
            best_iteration: fit.best_iteration,
            macro_f1: score,
            best_valid_loss,
        });
        pb.inc(1);
    }
    finish_with_success(&pb, &format!("{} validated", config.validation));

    let final_rounds = final_round_count(&folds, config.iteration_margin);
    debug!(final_rounds, "Refitting on all rows");

    let weights = sample_weights(&effective, config.weighting);
    let booster = Booster::fit(
        FitData {
            matrix: &prepared.matrix,
            labels: &encoded,
            weights: Some(&weights),
        },
        None,
        &params,
        &FitOptions {
            num_classes: index.len(),
            max_rounds: final_rounds,
            early_stopping_rounds: None,
        },
    )?
    .booster;

    let importance = booster.permutation_importance(&prepared.matrix, &encoded, config.seed)?;
    let feature_importance = FeatureImportance::ranked(&prepared.feature_names, &importance);

    let scores: Vec<f64> = folds.iter().map(|f| f.macro_f1).collect();
    let (macro_f1_mean, macro_f1_std) = mean_std(&scores);

    let mut artifact = ModelArtifact {
        header: ModelHeader {
            format_version: FORMAT_VERSION,
            schema_version: config.schema_version,
            feature_names: prepared.feature_names,
            categorical_features: prepared.categorical,
            vocabularies: prepared.vocabularies,
            class_labels: index.labels.clone(),
            label_space: counts_before.keys().copied().collect(),
            metadata: ArtifactMetadata::now(None),
        },
        booster,
    };

    let report = TrainingReport {
        n_rows: prepared.matrix.n_rows(),
        n_features: prepared.matrix.n_features(),
        validation: config.validation,
        weighting: config.weighting,
        fold_best_iterations: folds.iter().map(|f| f.best_iteration).collect(),
        fold_macro_f1: scores,
        macro_f1_mean,
        macro_f1_std,
        final_rounds,
        remap,
        class_counts_before: counts_before,
        class_counts_after: counts_after,
        feature_importance,
    };
    artifact.header.metadata.training = Some(report.clone());
    artifact.validate()?;

    Ok(TrainOutcome {
        artifact,
        folds,
        report,
    })
}

/// Mean best iteration over folds, truncated, plus the margin; at least one round.
pub fn final_round_count(folds: &[FoldOutcome], margin: usize) -> usize {
    if folds.is_empty() {
        return margin.max(1);
    }
    let mean = folds.iter().map(|f| f.best_iteration as f64).sum::<f64>() / folds.len() as f64;
    (mean.floor() as usize + margin).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(best_iteration: usize) -> FoldOutcome {
        FoldOutcome {
            fold: 1,
            train_rows: 10,
            valid_rows: 2,
            best_iteration,
            macro_f1: 0.5,
            best_valid_loss: 1.0,
        }
    }

    #[test]
    fn test_final_round_count() {
        assert_eq!(final_round_count(&[fold(20), fold(31)], 10), 35);
        assert_eq!(final_round_count(&[fold(7)], 10), 17);
        // 9.67 truncates to 9
        assert_eq!(final_round_count(&[fold(9), fold(10), fold(10)], 10), 19);
        assert_eq!(final_round_count(&[], 0), 1);
    }

    #[test]
    fn test_default_config() {
        let config = TrainConfig::default();
        assert_eq!(config.schema_version, SchemaVersion::Behavioral);
        assert_eq!(config.weighting, ClassWeighting::InverseSqrt);
        assert_eq!(config.validation, ValidationStrategy::KFold { folds: 5 });
        assert_eq!(config.min_class_count, 10);
        assert_eq!(config.patience, 30);
        assert_eq!(config.max_rounds, 200);
        assert_eq!(config.iteration_margin, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let df = df! { "User_ID" => ["U1", "U2"] }.unwrap();
        let result = train(&df, &TrainConfig::default());
        match result {
            Err(PipelineError::MissingColumn { column }) => assert_eq!(column, TARGET_COLUMN),
            other => panic!("expected MissingColumn, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let config = TrainConfig {
            max_rounds: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }
}
