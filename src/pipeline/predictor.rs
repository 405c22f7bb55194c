//! Batch inference against a trained artifact

use polars::prelude::*;
use tracing::debug;

use super::cleaner::{clean_with, has_column};
use super::features::engineer;
use super::schema::{ID_COLUMN, TARGET_COLUMN, UNKNOWN};
use crate::error::{PipelineError, Result};
use crate::model::artifact::ModelArtifact;
use crate::model::encode::FeatureMatrix;

/// One scored row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub user_id: String,
    pub bundle: i64,
}

/// Prepare a raw table the way the artifact was trained: clean and engineer
/// per its schema version, then drop the label column if present.
pub fn preprocess(df: &DataFrame, artifact: &ModelArtifact) -> Result<DataFrame> {
    let schema = artifact.schema_version();
    let mut cleaned = clean_with(df, schema)?;
    if schema.engineers_features() {
        cleaned = engineer(&cleaned)?;
    }
    if has_column(&cleaned, TARGET_COLUMN) {
        cleaned = cleaned.drop(TARGET_COLUMN)?;
    }
    Ok(cleaned)
}

/// Score every row of a preprocessed table, in input order.
///
/// A missing `User_ID` column is reported as is. Any other failure comes
/// back as [`PipelineError::Inference`].
pub fn predict(artifact: &ModelArtifact, df: &DataFrame) -> Result<Vec<Prediction>> {
    let user_ids = read_user_ids(df)?;
    let bundles = score(artifact, df).map_err(into_inference)?;

    Ok(user_ids
        .into_iter()
        .zip(bundles)
        .map(|(user_id, bundle)| Prediction { user_id, bundle })
        .collect())
}

fn read_user_ids(df: &DataFrame) -> Result<Vec<String>> {
    let column = df
        .column(ID_COLUMN)
        .map_err(|_| PipelineError::missing_column(ID_COLUMN))?;
    let ids = column.cast(&DataType::String).map_err(into_inference)?;
    let ids = ids
        .str()
        .map_err(into_inference)?
        .iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect();
    Ok(ids)
}

fn score(artifact: &ModelArtifact, df: &DataFrame) -> Result<Vec<i64>> {
    let filled = backfill(artifact, df)?;
    let header = &artifact.header;
    let matrix = FeatureMatrix::from_frame(
        &filled,
        &header.feature_names,
        &header.categorical_features,
        &header.vocabularies,
    )?;
    artifact
        .booster
        .predict(&matrix)?
        .into_iter()
        .map(|index| artifact.class_label(index))
        .collect()
}

/// Add every expected feature the table lacks, then select and order the
/// columns as the model expects.
pub fn backfill(artifact: &ModelArtifact, df: &DataFrame) -> Result<DataFrame> {
    let height = df.height();
    let mut filled = df.clone();
    for name in artifact.feature_names() {
        if has_column(&filled, name) {
            continue;
        }
        debug!(column = name.as_str(), "Back-filling absent feature");
        let column = if artifact.is_categorical(name) {
            Column::new(name.as_str().into(), vec![UNKNOWN; height])
        } else {
            Column::new(name.as_str().into(), vec![0.0f64; height])
        };
        filled.with_column(column)?;
    }
    Ok(filled.select(artifact.feature_names().iter().map(String::as_str))?)
}

/// Wrap a failure once, keeping its type name and message.
fn into_inference<E: Into<PipelineError>>(error: E) -> PipelineError {
    let error = error.into();
    if error.is_validation() {
        return error;
    }
    PipelineError::Inference {
        kind: error.kind_name().to_string(),
        message: error.to_string(),
    }
}

/// `User_ID, Purchased_Coverage_Bundle` frame of the predictions
pub fn predictions_to_frame(predictions: &[Prediction]) -> Result<DataFrame> {
    let ids: Vec<&str> = predictions.iter().map(|p| p.user_id.as_str()).collect();
    let bundles: Vec<i64> = predictions.iter().map(|p| p.bundle).collect();
    Ok(DataFrame::new(vec![
        Column::new(ID_COLUMN.into(), ids),
        Column::new(TARGET_COLUMN.into(), bundles),
    ])?)
}
