//! Raw record cleaning
//!
//! Drops unreliable columns, fills missing values with column-specific
//! defaults, encodes the policy start month on the unit circle and tags the
//! categorical columns so the booster can split on them natively.

use std::f64::consts::PI;

use polars::prelude::*;

use super::schema::{month_index, SchemaVersion, MONTH_COLUMN, MONTH_COS, MONTH_SIN, UNKNOWN};
use crate::error::Result;

/// Clean a raw table with the current schema rules.
pub fn clean(df: &DataFrame) -> Result<DataFrame> {
    clean_with(df, SchemaVersion::Cyclical)
}

/// Clean a raw table following the rules of a given schema version.
///
/// Every step is skipped when its column is absent, and already-cleaned
/// input passes through unchanged.
pub fn clean_with(df: &DataFrame, schema: SchemaVersion) -> Result<DataFrame> {
    let to_drop: Vec<&str> = schema
        .dropped_columns()
        .iter()
        .copied()
        .filter(|name| has_column(df, name))
        .collect();
    let mut df = df.drop_many(to_drop);

    let mut fills: Vec<Expr> = Vec::new();
    if has_column(&df, "Child_Dependents") {
        fills.push(col("Child_Dependents").fill_null(lit(0)));
    }
    if schema == SchemaVersion::Base && has_column(&df, "Broker_ID") {
        fills.push(col("Broker_ID").fill_null(lit(-1)));
    }

    let mut text_fills = vec!["Deductible_Tier", "Acquisition_Channel"];
    if schema == SchemaVersion::Base {
        text_fills.insert(0, "Region_Code");
    }
    for name in text_fills {
        if has_column(&df, name) {
            fills.push(col(name).cast(DataType::String).fill_null(lit(UNKNOWN)));
        }
    }

    if !fills.is_empty() {
        df = df.lazy().with_columns(fills).collect()?;
    }

    if schema.encodes_month() && has_column(&df, MONTH_COLUMN) {
        encode_month(&mut df)?;
    }

    for name in schema.categorical_columns() {
        if has_column(&df, name) {
            to_categorical(&mut df, name)?;
        }
    }

    Ok(df)
}

/// Cyclical month features: `(sin(2πm/12), cos(2πm/12))`.
pub fn month_to_cyclical(month: u32) -> (f64, f64) {
    let angle = 2.0 * PI * month as f64 / 12.0;
    (angle.sin(), angle.cos())
}

/// Replace the month abbreviation with its sine/cosine encoding.
fn encode_month(df: &mut DataFrame) -> Result<()> {
    let months = df.column(MONTH_COLUMN)?.cast(&DataType::String)?;
    let (sin, cos): (Vec<f64>, Vec<f64>) = months
        .str()?
        .iter()
        .map(|value| month_to_cyclical(month_index(value)))
        .unzip();

    df.with_column(Column::new(MONTH_SIN.into(), sin))?;
    df.with_column(Column::new(MONTH_COS.into(), cos))?;
    *df = df.drop(MONTH_COLUMN)?;
    Ok(())
}

fn to_categorical(df: &mut DataFrame, name: &str) -> Result<()> {
    let column = df.column(name)?;
    if is_categorical(column.dtype()) {
        return Ok(());
    }
    let converted = column
        .cast(&DataType::String)?
        .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
    df.with_column(converted)?;
    Ok(())
}

pub fn is_categorical(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Categorical(_, _) | DataType::Enum(_, _))
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> DataFrame {
        df! {
            "User_ID" => ["U1", "U2", "U3"],
            "Employer_ID" => [Some("E1"), None, None],
            "Broker_ID" => [Some(4.0f64), None, Some(9.0)],
            "Region_Code" => ["R1", "R2", "R3"],
            "Child_Dependents" => [Some(1i64), None, Some(2)],
            "Deductible_Tier" => [Some("Low"), None, Some("High")],
            "Acquisition_Channel" => [None, Some("Online"), Some("Agent")],
            "Policy_Start_Month" => [Some("Jan"), Some("Dec"), None],
            "Payment_Schedule" => ["Monthly", "Annual", "Monthly"],
        }
        .unwrap()
    }

    #[test]
    fn test_drops_unreliable_columns() {
        let cleaned = clean(&raw_frame()).unwrap();
        for name in ["Employer_ID", "Broker_ID", "Region_Code", MONTH_COLUMN] {
            assert!(!has_column(&cleaned, name), "{} should be dropped", name);
        }
    }

    #[test]
    fn test_fills_missing_values() {
        let cleaned = clean(&raw_frame()).unwrap();
        assert_eq!(cleaned.column("Child_Dependents").unwrap().null_count(), 0);
        let tiers = cleaned
            .column("Deductible_Tier")
            .unwrap()
            .cast(&DataType::String)
            .unwrap();
        let tiers: Vec<Option<&str>> = tiers.str().unwrap().iter().collect();
        assert_eq!(tiers, vec![Some("Low"), Some(UNKNOWN), Some("High")]);
    }

    #[test]
    fn test_marks_categorical_columns() {
        let cleaned = clean(&raw_frame()).unwrap();
        for name in ["Deductible_Tier", "Acquisition_Channel", "Payment_Schedule"] {
            assert!(is_categorical(cleaned.column(name).unwrap().dtype()));
        }
        assert!(!is_categorical(cleaned.column("User_ID").unwrap().dtype()));
    }

    #[test]
    fn test_missing_month_defaults_to_january() {
        let cleaned = clean(&raw_frame()).unwrap();
        let sin = cleaned.column(MONTH_SIN).unwrap().f64().unwrap().get(2).unwrap();
        let cos = cleaned.column(MONTH_COS).unwrap().f64().unwrap().get(2).unwrap();
        let (jan_sin, jan_cos) = month_to_cyclical(1);
        assert!((sin - jan_sin).abs() < 1e-12);
        assert!((cos - jan_cos).abs() < 1e-12);
    }

    #[test]
    fn test_base_schema_keeps_region_and_month() {
        let cleaned = clean_with(&raw_frame(), SchemaVersion::Base).unwrap();
        assert!(!has_column(&cleaned, "Employer_ID"));
        assert!(is_categorical(cleaned.column("Region_Code").unwrap().dtype()));
        assert!(is_categorical(cleaned.column(MONTH_COLUMN).unwrap().dtype()));
        assert!(!has_column(&cleaned, MONTH_SIN));
        let broker = cleaned.column("Broker_ID").unwrap().f64().unwrap().get(1);
        assert_eq!(broker, Some(-1.0));
    }

    #[test]
    fn test_absent_columns_are_skipped() {
        let df = df! { "User_ID" => ["U1"], "Vehicles_on_Policy" => [2i64] }.unwrap();
        let cleaned = clean(&df).unwrap();
        assert_eq!(cleaned.shape(), (1, 2));
    }
}
