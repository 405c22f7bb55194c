//! Command-line argument definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::{ArtifactFormat, BoosterParams};
use crate::pipeline::{ClassWeighting, SchemaVersion, TrainConfig, ValidationStrategy};
use crate::serve::ServeConfig;

/// Bundle-advisor - Train, evaluate and serve a coverage-bundle recommender
#[derive(Parser, Debug)]
#[command(name = "bundle-advisor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging. RUST_LOG takes precedence when set.
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model on a labelled policy table and save the artifact
    Train(TrainArgs),

    /// Score a policy table with a saved model
    Predict(PredictArgs),

    /// Serve a saved model over HTTP
    Serve(ServeArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationKind {
    /// Stratified k-fold cross-validation
    Kfold,
    /// Single stratified holdout slice
    Holdout,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Training data (CSV or Parquet) with a Purchased_Coverage_Bundle column
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output artifact path
    #[arg(short, long, default_value = "model.json")]
    pub output: PathBuf,

    /// Feature schema version: "base", "cyclical" or "behavioral"
    #[arg(long, default_value = "behavioral")]
    pub schema: SchemaVersion,

    /// Class weighting: "none", "inverse-sqrt" or "inverse-log"
    #[arg(long, default_value = "inverse-sqrt")]
    pub weighting: ClassWeighting,

    /// Validation strategy used to pick the number of boosting rounds
    #[arg(long, value_enum, default_value = "kfold")]
    pub validation: ValidationKind,

    /// Number of folds for k-fold validation
    #[arg(long, default_value = "5", value_parser = validate_folds)]
    pub folds: usize,

    /// Share of rows held out for holdout validation (exclusive 0.0 to 1.0)
    #[arg(long, default_value = "0.2", value_parser = validate_fraction)]
    pub holdout_fraction: f64,

    /// Classes with fewer rows are folded into the nearest larger class.
    /// Use 0 to disable folding.
    #[arg(long, default_value = "10")]
    pub min_class_count: usize,

    /// Maximum boosting rounds per validation fit
    #[arg(long, default_value = "200", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_rounds: u64,

    /// Early-stopping patience in rounds
    #[arg(long, default_value = "30")]
    pub patience: usize,

    /// Rounds added to the validated round count for the final refit
    #[arg(long, default_value = "10")]
    pub iteration_margin: usize,

    /// Shrinkage applied to every tree
    #[arg(long, default_value = "0.05", value_parser = validate_positive)]
    pub learning_rate: f64,

    /// Maximum tree depth
    #[arg(long, default_value = "6", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_depth: u32,

    /// Minimum rows in a leaf
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u64).range(1..))]
    pub min_child_samples: u64,

    /// Row fraction sampled per round (0.0 to 1.0]
    #[arg(long, default_value = "0.8", value_parser = validate_fraction_inclusive)]
    pub subsample: f64,

    /// Bound on a single tree's output before shrinkage
    #[arg(long, default_value = "4.0", value_parser = validate_positive)]
    pub max_delta_step: f64,

    /// Seed for splits, row sampling and importance shuffles
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Write the compact artifact form (JSON header plus one-line ensemble)
    #[arg(long, default_value = "false")]
    pub compact: bool,

    /// Skip writing feature_importance.csv and feature_importance.svg
    #[arg(long, default_value = "false")]
    pub no_report: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan (very slow for large files).
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

impl TrainArgs {
    pub fn validation_strategy(&self) -> ValidationStrategy {
        match self.validation {
            ValidationKind::Kfold => ValidationStrategy::KFold { folds: self.folds },
            ValidationKind::Holdout => ValidationStrategy::Holdout {
                fraction: self.holdout_fraction,
            },
        }
    }

    pub fn artifact_format(&self) -> ArtifactFormat {
        if self.compact {
            ArtifactFormat::Compact
        } else {
            ArtifactFormat::Json
        }
    }

    /// Build the trainer configuration from the parsed flags.
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            schema_version: self.schema,
            weighting: self.weighting,
            validation: self.validation_strategy(),
            min_class_count: self.min_class_count,
            max_rounds: self.max_rounds as usize,
            patience: self.patience,
            iteration_margin: self.iteration_margin,
            seed: self.seed,
            booster: BoosterParams {
                learning_rate: self.learning_rate,
                max_depth: self.max_depth,
                min_child_samples: self.min_child_samples as usize,
                subsample: self.subsample,
                max_delta_step: self.max_delta_step,
                seed: self.seed,
            },
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Saved model artifact
    #[arg(short, long, default_value = "model.json")]
    pub model: PathBuf,

    /// Policy table to score (CSV or Parquet) with a User_ID column
    #[arg(short, long)]
    pub input: PathBuf,

    /// Predictions output (CSV or Parquet, determined by extension)
    #[arg(short, long, default_value = "predictions.csv")]
    pub output: PathBuf,

    /// Number of rows to use for schema inference (CSV only).
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Saved model artifact
    #[arg(short, long, default_value = "model.json")]
    pub model: PathBuf,

    /// Bind host
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port
    #[arg(long, default_value = "8000")]
    pub port: u16,
}

impl ServeArgs {
    pub fn serve_config(&self) -> ServeConfig {
        ServeConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

fn parse_f64(s: &str) -> Result<f64, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for holdout_fraction
fn validate_fraction(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("fraction must be between 0.0 and 1.0 (exclusive), got {}", value))
    }
}

/// Validator for subsample
fn validate_fraction_inclusive(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(format!("fraction must be in (0.0, 1.0], got {}", value))
    }
}

fn validate_positive(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(format!("value must be positive, got {}", value))
    }
}

fn validate_folds(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid fold count", s))?;
    if value >= 2 {
        Ok(value)
    } else {
        Err(format!("folds must be at least 2, got {}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_defaults_match_trainer_defaults() {
        let cli = Cli::try_parse_from(["bundle-advisor", "train", "-i", "data.csv"]).unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert_eq!(args.output, PathBuf::from("model.json"));
        assert_eq!(args.artifact_format(), ArtifactFormat::Json);
        assert_eq!(args.train_config(), TrainConfig::default());
    }

    #[test]
    fn test_holdout_and_compact_flags() {
        let cli = Cli::try_parse_from([
            "bundle-advisor",
            "train",
            "-i",
            "data.csv",
            "--validation",
            "holdout",
            "--holdout-fraction",
            "0.25",
            "--compact",
            "--weighting",
            "inverse-log",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let config = args.train_config();
        assert_eq!(config.validation, ValidationStrategy::Holdout { fraction: 0.25 });
        assert_eq!(config.weighting, ClassWeighting::InverseLog);
        assert_eq!(args.artifact_format(), ArtifactFormat::Compact);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["bundle-advisor", "train", "-i", "d.csv", "--folds", "1"]).is_err());
        assert!(Cli::try_parse_from(["bundle-advisor", "train", "-i", "d.csv", "--subsample", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["bundle-advisor", "train", "-i", "d.csv", "--schema", "v9"]).is_err());
        assert!(Cli::try_parse_from(["bundle-advisor", "train", "-i", "d.csv", "--max-rounds", "0"]).is_err());
        assert!(Cli::try_parse_from(["bundle-advisor", "train", "-i", "d.csv", "--max-depth", "0"]).is_err());
        assert!(Cli::try_parse_from(["bundle-advisor", "train", "-i", "d.csv", "--max-delta-step", "-1"]).is_err());
    }

    #[test]
    fn test_serve_config_and_global_verbose() {
        let cli = Cli::try_parse_from(["bundle-advisor", "serve", "--port", "9000", "-v"]).unwrap();
        assert!(cli.verbose);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let config = args.serve_config();
        assert_eq!(config.addr(), "0.0.0.0:9000");
        assert_eq!(args.model, PathBuf::from("model.json"));
    }
}
