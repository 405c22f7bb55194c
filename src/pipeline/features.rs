//! Behavioral feature engineering and feature/label splitting

use polars::prelude::*;

use super::cleaner::{has_column, is_categorical};
use super::schema::{ID_COLUMN, TARGET_COLUMN};
use crate::error::{PipelineError, Result};

/// Source columns the behavioral features are derived from
pub const ENGINEERING_INPUTS: [&str; 11] = [
    "Adult_Dependents",
    "Child_Dependents",
    "Infant_Dependents",
    "Previous_Claims_Filed",
    "Years_Without_Claims",
    "Policy_Amendments_Count",
    "Custom_Riders_Requested",
    "Days_Since_Quote",
    "Underwriting_Processing_Days",
    "Estimated_Annual_Income",
    "Existing_Policyholder",
];

fn num(name: &str) -> Expr {
    col(name).cast(DataType::Float64)
}

/// Derive the six behavioral features. Additive only: no column is removed.
///
/// Denominators are offset by one so zero counts stay finite. A null input
/// produces a null feature for that row.
pub fn engineer(df: &DataFrame) -> Result<DataFrame> {
    if let Some(missing) = ENGINEERING_INPUTS.iter().find(|c| !has_column(df, c)) {
        return Err(PipelineError::missing_column(*missing));
    }

    let family_size = num("Adult_Dependents") + num("Child_Dependents") + num("Infant_Dependents");

    let derived = [
        family_size.clone().alias("Family_Size"),
        (num("Previous_Claims_Filed") / (num("Years_Without_Claims") + lit(1.0)))
            .alias("Risk_Index"),
        (num("Policy_Amendments_Count") + num("Custom_Riders_Requested"))
            .alias("Policy_Engagement"),
        (num("Days_Since_Quote") / (num("Underwriting_Processing_Days") + lit(1.0)))
            .alias("Time_To_Convert"),
        (num("Estimated_Annual_Income") / (family_size + lit(1.0))).alias("Income_Per_Dependent"),
        (num("Existing_Policyholder") * num("Years_Without_Claims")).alias("Loyalty_Score"),
    ];

    Ok(df.clone().lazy().with_columns(derived).collect()?)
}

/// Feature column names in table order, plus the categorical subset.
///
/// Identifier and label columns are never features.
pub fn feature_columns(df: &DataFrame) -> (Vec<String>, Vec<String>) {
    let mut names = Vec::new();
    let mut categorical = Vec::new();
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == ID_COLUMN || name == TARGET_COLUMN {
            continue;
        }
        names.push(name.to_string());
        if is_categorical(column.dtype()) || column.dtype() == &DataType::String {
            categorical.push(name.to_string());
        }
    }
    (names, categorical)
}

/// Split a cleaned table into a feature table and integer labels.
pub fn split_features_target(df: &DataFrame) -> Result<(DataFrame, Vec<i64>)> {
    let labels = extract_labels(df)?;
    let (names, _) = feature_columns(df);
    let features = df.select(names)?;
    Ok((features, labels))
}

/// Read the label column as integer bundle ids.
pub fn extract_labels(df: &DataFrame) -> Result<Vec<i64>> {
    let column = df
        .column(TARGET_COLUMN)
        .map_err(|_| PipelineError::missing_column(TARGET_COLUMN))?;

    let invalid = |reason: String| PipelineError::InvalidLabel {
        column: TARGET_COLUMN.to_string(),
        reason,
    };

    if !column.dtype().is_primitive_numeric() {
        return Err(invalid(format!("expected integer class ids, got {}", column.dtype())));
    }

    let values = column.cast(&DataType::Float64)?;
    values
        .f64()?
        .iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
            Some(v) => Err(invalid(format!("row {} holds non-integer value {}", row, v))),
            None => Err(invalid(format!("row {} is null", row))),
        })
        .collect()
}
