//! Bundle-advisor CLI
//!
//! `train` fits and saves a model, `predict` scores a table, `serve` exposes
//! a saved model over HTTP.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bundle_advisor::cli::{Cli, Commands, PredictArgs, ServeArgs, TrainArgs};
use bundle_advisor::model::ModelArtifact;
use bundle_advisor::pipeline::{
    load_dataset_with_progress, predict, predictions_to_frame, preprocess, save_dataset, train,
};
use bundle_advisor::report::{write_importance_report, TrainingSummary};
use bundle_advisor::serve::serve;
use bundle_advisor::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config,
    print_count, print_info, print_step_header, print_success, ConfigCard,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Predict(args) => run_predict(args),
        Commands::Serve(args) => run_serve(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "bundle_advisor=debug,tower_http=debug,info"
    } else {
        "bundle_advisor=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_train(args: &TrainArgs) -> Result<()> {
    let config = args.train_config();
    let started = Instant::now();

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&ConfigCard {
        input: &args.input,
        output: &args.output,
        schema: config.schema_version.to_string(),
        weighting: config.weighting.to_string(),
        validation: config.validation.to_string(),
        rounds: format!("max {} (patience {})", config.max_rounds, config.patience),
    });

    // Step 1: Load dataset
    print_step_header(1, "Load Dataset");
    let (df, rows, cols, memory_mb) =
        load_dataset_with_progress(&args.input, args.infer_schema_length)?;
    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", rows);
    println!("      Columns: {}", cols);
    println!("      Estimated memory: {:.2} MB", memory_mb);

    // Step 2: Validate and refit
    print_step_header(2, "Train Model");
    let outcome = train(&df, &config).context("Training failed")?;
    print_count(
        "classes",
        outcome.artifact.header.class_labels.len(),
        Some(format!("({} bundle ids seen)", outcome.artifact.header.label_space.len()).as_str()),
    );
    print_success(&format!(
        "Refit on all rows with {} rounds",
        outcome.report.final_rounds
    ));

    // Step 3: Persist
    print_step_header(3, "Save Artifact");
    let spinner = create_spinner("Writing model artifact...");
    outcome
        .artifact
        .save(&args.output, args.artifact_format())
        .with_context(|| format!("Failed to save model to {}", args.output.display()))?;
    finish_with_success(&spinner, &format!("Model saved to {}", args.output.display()));

    if args.no_report {
        print_info("Feature importance report skipped");
    } else {
        let (csv_path, svg_path) =
            write_importance_report(&outcome.report.feature_importance, &args.output)?;
        print_success(&format!("Importance table: {}", csv_path.display()));
        print_success(&format!("Importance chart: {}", svg_path.display()));
    }

    TrainingSummary::new(&outcome.report).display();
    info!(elapsed_secs = started.elapsed().as_secs_f64(), "Training run finished");
    print_completion("Training complete!");
    Ok(())
}

fn run_predict(args: &PredictArgs) -> Result<()> {
    print_banner(env!("CARGO_PKG_VERSION"));

    print_step_header(1, "Load Model");
    let artifact = ModelArtifact::load(&args.model)
        .with_context(|| format!("Failed to load model from {}", args.model.display()))?;
    print_count(
        "model features",
        artifact.feature_names().len(),
        Some(format!("(schema {})", artifact.schema_version()).as_str()),
    );

    print_step_header(2, "Load Dataset");
    let (df, rows, _, _) = load_dataset_with_progress(&args.input, args.infer_schema_length)?;
    print_count("rows", rows, None);

    print_step_header(3, "Predict");
    let spinner = create_spinner("Scoring rows...");
    let prepared = preprocess(&df, &artifact).context("Failed to prepare input table")?;
    let predictions = predict(&artifact, &prepared)?;
    finish_with_success(&spinner, &format!("{} rows scored", predictions.len()));

    let mut frame = predictions_to_frame(&predictions)?;
    save_dataset(&mut frame, &args.output)?;
    print_success(&format!("Predictions saved to {}", args.output.display()));

    print_completion("Prediction complete!");
    Ok(())
}

fn run_serve(args: &ServeArgs) -> Result<()> {
    let artifact = ModelArtifact::load(&args.model)
        .with_context(|| format!("Failed to load model from {}", args.model.display()))?;
    info!(
        model = %args.model.display(),
        schema = %artifact.schema_version(),
        "Model loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(serve(artifact, &args.serve_config()))
}
