//! Error types shared by the training and inference pipeline.
//!
//! Schema and data-quality failures are distinct variants so callers can
//! tell a bad input table from an unlearnable label distribution. Inference
//! failures are collapsed into a single variant that keeps the original
//! error's type name and message.

use thiserror::Error;

/// Errors raised by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column is absent from the input table.
    #[error("required column '{column}' not found in table")]
    MissingColumn { column: String },

    /// The label column holds values that are not usable class ids.
    #[error("label column '{column}' is invalid: {reason}")]
    InvalidLabel { column: String, reason: String },

    /// Fewer than two distinct classes, nothing to learn.
    #[error("training requires at least 2 distinct classes, found {found}")]
    NotEnoughClasses { found: usize },

    /// A class cannot appear on both sides of a stratified split.
    #[error("class {class} has {count} row(s); stratified validation needs at least 2")]
    Unstratifiable { class: i64, count: usize },

    /// Rare-class folding found no class large enough to absorb the others.
    #[error("no class has at least {min_count} rows to absorb rare classes")]
    NoClassMeetsMinimum { min_count: usize },

    /// Any failure raised while scoring a table.
    #[error("prediction failed ({kind}): {message}")]
    Inference { kind: String, message: String },

    /// The model artifact could not be written, read, or is inconsistent.
    #[error("model artifact error: {0}")]
    Artifact(String),

    /// Invalid training or booster configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    /// Whether this is a validation-type failure that inference re-raises verbatim.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::InvalidLabel { .. } | Self::Inference { .. }
        )
    }

    /// Short type name used as diagnostic text when wrapping inference failures.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::MissingColumn { .. } => "MissingColumn",
            Self::InvalidLabel { .. } => "InvalidLabel",
            Self::NotEnoughClasses { .. } => "NotEnoughClasses",
            Self::Unstratifiable { .. } => "Unstratifiable",
            Self::NoClassMeetsMinimum { .. } => "NoClassMeetsMinimum",
            Self::Inference { .. } => "Inference",
            Self::Artifact(_) => "Artifact",
            Self::Config(_) => "Config",
            Self::Polars(_) => "PolarsError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
