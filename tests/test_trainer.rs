//! Integration tests for the training pipeline and artifact persistence

use bundle_advisor::model::{ArtifactFormat, ModelArtifact};
use bundle_advisor::pipeline::trainer::final_round_count;
use bundle_advisor::pipeline::{
    predict, preprocess, train, ClassWeighting, SchemaVersion, TrainConfig, ValidationStrategy,
};
use bundle_advisor::PipelineError;
use polars::prelude::*;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::{fast_config, policy_frame, policy_frame_with_rare_tail};

fn labels(df: &DataFrame) -> Vec<i64> {
    df.column("Purchased_Coverage_Bundle")
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

fn predicted(artifact: &ModelArtifact, df: &DataFrame) -> Vec<i64> {
    let prepared = preprocess(df, artifact).unwrap();
    predict(artifact, &prepared)
        .unwrap()
        .into_iter()
        .map(|p| p.bundle)
        .collect()
}

#[test]
fn test_train_learns_bundle_rule() {
    let df = policy_frame(400, 11);
    let outcome = train(&df, &fast_config()).unwrap();

    assert_eq!(outcome.folds.len(), 3);
    assert_eq!(outcome.report.fold_best_iterations.len(), 3);
    assert_eq!(
        outcome.report.final_rounds,
        final_round_count(&outcome.folds, fast_config().iteration_margin)
    );
    assert_eq!(outcome.artifact.booster.n_rounds(), outcome.report.final_rounds);
    assert_eq!(outcome.artifact.header.class_labels, (0..8).collect::<Vec<i64>>());
    assert_eq!(outcome.artifact.header.schema_version, SchemaVersion::Behavioral);

    let truth = labels(&df);
    let preds = predicted(&outcome.artifact, &df);
    let hits = truth.iter().zip(&preds).filter(|(t, p)| t == p).count();
    assert!(
        hits as f64 / truth.len() as f64 > 0.6,
        "training accuracy too low: {}/{}",
        hits,
        truth.len()
    );
    assert!(outcome.report.macro_f1_mean > 0.0);
}

#[test]
fn test_report_records_training_context() {
    let config = TrainConfig {
        min_class_count: 3,
        ..fast_config()
    };
    let outcome = train(&policy_frame(240, 12), &config).unwrap();
    let report = &outcome.report;

    assert_eq!(report.n_rows, 240);
    assert_eq!(report.n_features, outcome.artifact.feature_names().len());
    assert_eq!(report.weighting, ClassWeighting::InverseSqrt);
    assert!(report.remap.is_identity());
    assert_eq!(report.class_counts_before, report.class_counts_after);
    assert_eq!(report.feature_importance.len(), report.n_features);
    assert!(report.feature_importance[0].importance > 0.0);
    let share: f64 = report.feature_importance.iter().map(|r| r.share).sum();
    assert!((share - 1.0).abs() < 1e-9);
    assert_eq!(
        outcome.artifact.header.metadata.training.as_ref(),
        Some(report)
    );
}

#[test]
fn test_rare_classes_fold_into_neighbour() {
    let df = policy_frame_with_rare_tail(300, 5, 13);
    let outcome = train(&df, &fast_config()).unwrap();
    let report = &outcome.report;
    let header = &outcome.artifact.header;

    assert_eq!(report.remap.folded.get(&8), Some(&7));
    assert_eq!(report.remap.folded.get(&9), Some(&7));
    assert_eq!(report.class_counts_before[&8], 5);
    assert!(report.class_counts_after.values().all(|&c| c >= 10));
    assert!(!report.class_counts_after.contains_key(&9));

    assert!(header.label_space.contains(&8) && header.label_space.contains(&9));
    assert!(!header.class_labels.contains(&8));

    for bundle in predicted(&outcome.artifact, &df) {
        assert!(header.label_space.contains(&bundle), "{} outside label space", bundle);
        assert!((0..=9).contains(&bundle));
    }
}

#[test]
fn test_single_class_is_rejected() {
    let mut df = policy_frame(40, 14);
    df.with_column(Column::new("Purchased_Coverage_Bundle".into(), vec![3i64; 40]))
        .unwrap();
    match train(&df, &fast_config()) {
        Err(PipelineError::NotEnoughClasses { found }) => assert_eq!(found, 1),
        other => panic!("expected NotEnoughClasses, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_null_label_is_rejected() {
    let mut df = policy_frame(40, 15);
    let mut values: Vec<Option<i64>> = labels(&df).into_iter().map(Some).collect();
    values[7] = None;
    df.with_column(Column::new("Purchased_Coverage_Bundle".into(), values))
        .unwrap();
    assert!(matches!(
        train(&df, &fast_config()),
        Err(PipelineError::InvalidLabel { .. })
    ));
}

#[test]
fn test_singleton_class_cannot_be_stratified() {
    let mut df = policy_frame(120, 16);
    let mut values = labels(&df);
    values[0] = 9;
    df.with_column(Column::new("Purchased_Coverage_Bundle".into(), values))
        .unwrap();
    let config = TrainConfig {
        min_class_count: 0,
        ..fast_config()
    };
    assert!(matches!(
        train(&df, &config),
        Err(PipelineError::Unstratifiable { class: 9, count: 1 })
    ));
}

#[test]
fn test_holdout_validation_runs_single_split() {
    let config = TrainConfig {
        validation: ValidationStrategy::Holdout { fraction: 0.25 },
        weighting: ClassWeighting::InverseLog,
        ..fast_config()
    };
    let outcome = train(&policy_frame(200, 17), &config).unwrap();
    assert_eq!(outcome.folds.len(), 1);
    let fold = &outcome.folds[0];
    assert_eq!(fold.train_rows + fold.valid_rows, 200);
    assert_eq!(
        outcome.report.final_rounds,
        fold.best_iteration + config.iteration_margin
    );
}

#[test]
fn test_training_is_deterministic() {
    let df = policy_frame(160, 18);
    let a = train(&df, &fast_config()).unwrap();
    let b = train(&df, &fast_config()).unwrap();
    assert_eq!(
        a.artifact.booster.to_text().unwrap(),
        b.artifact.booster.to_text().unwrap()
    );
    assert_eq!(a.report.feature_importance, b.report.feature_importance);
    assert_eq!(a.report.fold_best_iterations, b.report.fold_best_iterations);
}

#[test]
fn test_artifact_round_trip_both_formats() {
    let df = policy_frame(200, 19);
    let outcome = train(&df, &fast_config()).unwrap();
    let expected = predicted(&outcome.artifact, &df);
    let dir = TempDir::new().unwrap();

    for (name, format) in [
        ("model.json", ArtifactFormat::Json),
        ("model.compact", ArtifactFormat::Compact),
    ] {
        let path = dir.path().join("nested").join(name);
        outcome.artifact.save(&path, format).unwrap();
        assert!(!path.with_file_name(format!("{}.tmp", name)).exists());

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.header.feature_names, outcome.artifact.header.feature_names);
        assert_eq!(loaded.header.class_labels, outcome.artifact.header.class_labels);
        assert_eq!(predicted(&loaded, &df), expected, "{:?} changed predictions", format);

        let first_row = df.slice(0, 1);
        let bundle = predicted(&loaded, &first_row)[0];
        assert!(loaded.header.label_space.contains(&bundle));
    }
}

#[test]
fn test_base_schema_model_predicts_raw_tables() {
    let config = TrainConfig {
        schema_version: SchemaVersion::Base,
        ..fast_config()
    };
    let df = policy_frame(200, 20);
    let outcome = train(&df, &config).unwrap();
    let names = outcome.artifact.feature_names();
    assert!(names.iter().any(|n| n == "Region_Code"));
    assert!(!names.iter().any(|n| n == "Family_Size"));
    assert_eq!(predicted(&outcome.artifact, &df).len(), 200);
}
