//! Benchmark of the table-level preparation steps
//!
//! Run with: cargo bench --bench pipeline_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use bundle_advisor::pipeline::{clean, engineer, inverse_sqrt_sample_weights};

/// Raw policy-like table with the columns cleaning and engineering touch
fn generate_policy_frame(n_rows: usize, seed: u64) -> DataFrame {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let months = ["Jan", "Apr", "Jul", "Oct", "Dec"];
    let tiers = ["Low", "Medium", "High"];

    let mut count = |hi: i64| -> Vec<i64> { (0..n_rows).map(|_| rng.gen_range(0..hi)).collect() };
    let adult = count(3);
    let child = count(3);
    let infant = count(2);
    let claims = count(4);
    let years = count(8);
    let amendments = count(5);
    let riders = count(4);
    let days = count(60);
    let underwriting = count(30);
    let existing = count(2);
    let month_idx = count(months.len() as i64);
    let tier_idx = count(tiers.len() as i64);
    let label = count(8);

    let income: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(20_000.0..120_000.0)).collect();

    df! {
        "User_ID" => (0..n_rows).map(|i| format!("U{}", i)).collect::<Vec<_>>(),
        "Policy_Start_Month" => month_idx.iter().map(|&i| months[i as usize]).collect::<Vec<_>>(),
        "Deductible_Tier" => tier_idx.iter().map(|&i| tiers[i as usize]).collect::<Vec<_>>(),
        "Adult_Dependents" => adult,
        "Child_Dependents" => child,
        "Infant_Dependents" => infant,
        "Previous_Claims_Filed" => claims,
        "Years_Without_Claims" => years,
        "Policy_Amendments_Count" => amendments,
        "Custom_Riders_Requested" => riders,
        "Days_Since_Quote" => days,
        "Underwriting_Processing_Days" => underwriting,
        "Existing_Policyholder" => existing,
        "Estimated_Annual_Income" => income,
        "Purchased_Coverage_Bundle" => label,
    }
    .expect("Failed to create DataFrame")
}

fn benchmark_clean_engineer(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");

    for n_rows in [10_000usize, 100_000] {
        let df = generate_policy_frame(n_rows, 42);
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::new("clean", n_rows), &df, |b, df| {
            b.iter(|| clean(black_box(df)).expect("clean failed"))
        });
        let cleaned = clean(&df).expect("clean failed");
        group.bench_with_input(BenchmarkId::new("engineer", n_rows), &cleaned, |b, df| {
            b.iter(|| engineer(black_box(df)).expect("engineer failed"))
        });
    }
    group.finish();
}

fn benchmark_weights(c: &mut Criterion) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    let labels: Vec<i64> = (0..100_000).map(|_| rng.gen_range(0..10)).collect();
    c.bench_function("inverse_sqrt_weights_100k", |b| {
        b.iter(|| inverse_sqrt_sample_weights(black_box(&labels)))
    });
}

criterion_group!(benches, benchmark_clean_engineer, benchmark_weights);
criterion_main!(benches);
