//! Shared test utilities and fixture generators

#![allow(dead_code)]

use std::path::PathBuf;

use bundle_advisor::model::BoosterParams;
use bundle_advisor::pipeline::{
    records_to_frame, save_dataset, PolicyRecord, TrainConfig, ValidationStrategy,
};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const TIERS: [&str; 3] = ["Low", "Medium", "High"];
const CHANNELS: [&str; 3] = ["Online", "Agent", "Partner"];
const SCHEDULES: [&str; 2] = ["Monthly", "Annual"];
const EMPLOYMENT: [&str; 3] = ["Employed", "Self-Employed", "Retired"];
const BROKERS: [&str; 2] = ["Direct", "Corporate"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Bundle implied by income band and deductible tier: classes 0..=7.
pub fn bundle_for(income: f64, tier: Option<&str>) -> i64 {
    let band = (((income - 20_000.0) / 25_000.0).floor() as i64).clamp(0, 3);
    let high = i64::from(tier == Some("High"));
    band * 2 + high
}

/// Raw policy records with a learnable bundle label.
///
/// A few values are left missing so cleaning has something to fill.
pub fn policy_records(n: usize, seed: u64) -> Vec<PolicyRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let income = rng.gen_range(20_000.0..120_000.0);
            let tier = if i % 17 == 0 {
                None
            } else {
                Some(TIERS[rng.gen_range(0..TIERS.len())])
            };
            let years = rng.gen_range(0..8) as f64;
            PolicyRecord {
                user_id: Some(format!("U{:05}", i)),
                policy_start_month: Some(MONTHS[rng.gen_range(0..12)].to_string()),
                broker_agency_type: Some(BROKERS[rng.gen_range(0..2)].to_string()),
                deductible_tier: tier.map(str::to_string),
                acquisition_channel: if i % 13 == 0 {
                    None
                } else {
                    Some(CHANNELS[rng.gen_range(0..3)].to_string())
                },
                payment_schedule: Some(SCHEDULES[rng.gen_range(0..2)].to_string()),
                employment_status: Some(EMPLOYMENT[rng.gen_range(0..3)].to_string()),
                employer_id: Some(format!("E{}", rng.gen_range(0..50))),
                region_code: Some(format!("R{}", rng.gen_range(0..5))),
                policy_cancelled_post_purchase: Some(rng.gen_range(0..2) as f64),
                policy_start_year: Some(rng.gen_range(2015..2025) as f64),
                policy_start_week: Some(rng.gen_range(1..53) as f64),
                policy_start_day: Some(rng.gen_range(1..29) as f64),
                grace_period_extensions: Some(rng.gen_range(0..3) as f64),
                previous_policy_duration_months: Some(rng.gen_range(0..48) as f64),
                adult_dependents: Some(rng.gen_range(0..3) as f64),
                child_dependents: if i % 11 == 0 {
                    None
                } else {
                    Some(rng.gen_range(0..3) as f64)
                },
                infant_dependents: Some(rng.gen_range(0..2) as f64),
                existing_policyholder: Some(rng.gen_range(0..2) as f64),
                previous_claims_filed: Some(rng.gen_range(0..4) as f64),
                years_without_claims: Some(years),
                policy_amendments_count: Some(rng.gen_range(0..5) as f64),
                underwriting_processing_days: Some(rng.gen_range(1..30) as f64),
                vehicles_on_policy: Some(rng.gen_range(0..4) as f64),
                custom_riders_requested: Some(rng.gen_range(0..4) as f64),
                estimated_annual_income: Some(income),
                days_since_quote: Some(rng.gen_range(0..60) as f64),
                broker_id: Some(rng.gen_range(1..200) as f64),
                purchased_coverage_bundle: Some(bundle_for(income, tier)),
            }
        })
        .collect()
}

/// Labelled raw policy table.
pub fn policy_frame(n: usize, seed: u64) -> DataFrame {
    records_to_frame(&policy_records(n, seed)).unwrap()
}

/// Labelled table with bundles 8 and 9 appended at `rare_rows` rows each.
pub fn policy_frame_with_rare_tail(n: usize, rare_rows: usize, seed: u64) -> DataFrame {
    let mut records = policy_records(n + 2 * rare_rows, seed);
    for (i, record) in records.iter_mut().skip(n).enumerate() {
        record.purchased_coverage_bundle = Some(if i < rare_rows { 8 } else { 9 });
    }
    records_to_frame(&records).unwrap()
}

/// Small and fast training configuration for tests.
pub fn fast_config() -> TrainConfig {
    TrainConfig {
        validation: ValidationStrategy::KFold { folds: 3 },
        max_rounds: 30,
        patience: 5,
        iteration_margin: 2,
        booster: BoosterParams {
            learning_rate: 0.2,
            max_depth: 4,
            min_child_samples: 5,
            ..BoosterParams::default()
        },
        ..TrainConfig::default()
    }
}

/// Write a DataFrame to a temporary CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("policies.csv");
    save_dataset(df, &path).unwrap();
    (temp_dir, path)
}

/// Column values as strings, with categoricals decoded.
pub fn string_values(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::String)
        .unwrap()
        .str()
        .unwrap()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

pub fn f64_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .iter()
        .collect()
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}
