//! Boosted multiclass ensemble on `gbdt` trees and the persisted model artifact

pub mod artifact;
pub mod booster;
pub mod encode;

pub use artifact::{
    ArtifactFormat, ArtifactMetadata, FeatureImportance, ModelArtifact, ModelHeader,
    TrainingReport,
};
pub use booster::{Booster, BoosterParams, FitData, FitOptions, FitResult};
pub use encode::{learn_vocabularies, FeatureMatrix, Vocabularies};
