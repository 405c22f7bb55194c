//! Pipeline module - cleaning, feature preparation, training and inference

pub mod cleaner;
pub mod features;
pub mod loader;
pub mod metrics;
pub mod predictor;
pub mod record;
pub mod schema;
pub mod split;
pub mod target;
pub mod trainer;
pub mod weights;

pub use cleaner::{clean, clean_with};
pub use features::{engineer, extract_labels, feature_columns, split_features_target};
pub use loader::*;
pub use predictor::{predict, predictions_to_frame, preprocess, Prediction};
pub use record::{records_to_frame, PolicyRecord};
pub use schema::SchemaVersion;
pub use split::{Split, ValidationStrategy};
pub use target::*;
pub use trainer::{train, FoldOutcome, TrainConfig, TrainOutcome};
pub use weights::*;
