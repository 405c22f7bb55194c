//! Persisted model: everything inference needs in one file
//!
//! Two on-disk forms share one loader. `Json` stores the whole artifact as a
//! JSON document. `Compact` stores a marker line, the header as a single JSON
//! line, then the ensemble in the booster's single-line text form.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::booster::Booster;
use super::encode::Vocabularies;
use crate::error::{PipelineError, Result};
use crate::pipeline::schema::SchemaVersion;
use crate::pipeline::split::ValidationStrategy;
use crate::pipeline::target::{ClassCounts, ClassRemap};
use crate::pipeline::weights::ClassWeighting;

/// First line of a compact artifact
pub const COMPACT_MARKER: &str = "#bundle-advisor compact v1";

/// Version of the artifact layout
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactFormat {
    #[default]
    Json,
    Compact,
}

/// Permutation importance of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Rise in multi-logloss when the feature is shuffled
    pub importance: f64,
    /// Share of the total positive importance
    pub share: f64,
}

impl FeatureImportance {
    /// Pair scores with feature names, sorted by importance (descending).
    pub fn ranked(names: &[String], scores: &[f64]) -> Vec<Self> {
        let total: f64 = scores.iter().filter(|s| **s > 0.0).sum();
        let mut rows: Vec<Self> = names
            .iter()
            .zip(scores)
            .map(|(feature, &importance)| Self {
                feature: feature.clone(),
                importance,
                share: if total > 0.0 {
                    importance.max(0.0) / total
                } else {
                    0.0
                },
            })
            .collect();
        rows.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        rows
    }
}

/// Outcome of a training run, kept with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_rows: usize,
    pub n_features: usize,
    pub validation: ValidationStrategy,
    pub weighting: ClassWeighting,
    pub fold_best_iterations: Vec<usize>,
    pub fold_macro_f1: Vec<f64>,
    pub macro_f1_mean: f64,
    pub macro_f1_std: f64,
    pub final_rounds: usize,
    pub remap: ClassRemap,
    pub class_counts_before: ClassCounts,
    pub class_counts_after: ClassCounts,
    pub feature_importance: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub crate_version: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub training: Option<TrainingReport>,
}

impl ArtifactMetadata {
    pub fn now(training: Option<TrainingReport>) -> Self {
        Self {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            training,
        }
    }
}

/// Everything except the ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHeader {
    pub format_version: u32,
    pub schema_version: SchemaVersion,
    /// Feature columns in the order the booster expects
    pub feature_names: Vec<String>,
    pub categorical_features: Vec<String>,
    pub vocabularies: Vocabularies,
    /// Bundle id for each booster class index
    pub class_labels: Vec<i64>,
    /// Every bundle id seen in the training labels, before folding
    pub label_space: Vec<i64>,
    pub metadata: ArtifactMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub header: ModelHeader,
    pub booster: Booster,
}

impl ModelArtifact {
    /// Check the ensemble's shape and that header and ensemble agree.
    pub fn validate(&self) -> Result<()> {
        self.booster.validate()?;
        let header = &self.header;
        if header.format_version != FORMAT_VERSION {
            return Err(PipelineError::Artifact(format!(
                "unsupported artifact format version {}",
                header.format_version
            )));
        }
        if self.booster.num_features != header.feature_names.len() {
            return Err(PipelineError::Artifact(format!(
                "ensemble uses {} features but the header lists {}",
                self.booster.num_features,
                header.feature_names.len()
            )));
        }
        if self.booster.num_classes != header.class_labels.len() {
            return Err(PipelineError::Artifact(format!(
                "ensemble has {} classes but the header lists {}",
                self.booster.num_classes,
                header.class_labels.len()
            )));
        }
        if let Some(label) = header
            .class_labels
            .iter()
            .find(|l| !header.label_space.contains(l))
        {
            return Err(PipelineError::Artifact(format!(
                "class {} is outside the label space",
                label
            )));
        }
        if let Some(name) = header
            .categorical_features
            .iter()
            .find(|name| !header.feature_names.contains(name))
        {
            return Err(PipelineError::Artifact(format!(
                "categorical feature '{}' is not a model feature",
                name
            )));
        }
        Ok(())
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.header.schema_version
    }

    pub fn feature_names(&self) -> &[String] {
        &self.header.feature_names
    }

    pub fn is_categorical(&self, feature: &str) -> bool {
        self.header.categorical_features.iter().any(|c| c == feature)
    }

    /// Bundle id of a booster class index
    pub fn class_label(&self, index: usize) -> Result<i64> {
        self.header.class_labels.get(index).copied().ok_or_else(|| {
            PipelineError::Artifact(format!("class index {} has no bundle id", index))
        })
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_compact_string(&self) -> Result<String> {
        let header = serde_json::to_string(&self.header)?;
        Ok(format!("{}\n{}\n{}\n", COMPACT_MARKER, header, self.booster.to_text()?))
    }

    /// Parse either form, detected from the first line.
    pub fn from_str_any(text: &str) -> Result<Self> {
        let artifact = match text.strip_prefix(COMPACT_MARKER) {
            Some(rest) => {
                let rest = rest.trim_start_matches(['\r', '\n']);
                let (header_line, ensemble) = rest.split_once('\n').ok_or_else(|| {
                    PipelineError::Artifact("compact artifact has no ensemble section".to_string())
                })?;
                let header: ModelHeader = serde_json::from_str(header_line.trim())?;
                let booster = Booster::from_text(ensemble)?;
                Self { header, booster }
            }
            None => serde_json::from_str(text)?,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Write to `path` through a sibling temporary file and a rename.
    pub fn save(&self, path: &Path, format: ArtifactFormat) -> Result<()> {
        self.validate()?;
        let body = match format {
            ArtifactFormat::Json => self.to_json_string()?,
            ArtifactFormat::Compact => self.to_compact_string()?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        if let Err(e) = fs::write(&tmp, body).and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            PipelineError::Artifact(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_str_any(&text)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "model".into());
    name.push(".tmp");
    path.with_file_name(name)
}
