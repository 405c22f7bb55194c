//! Bundle-advisor: coverage-bundle recommendation for insurance policy records
//!
//! Cleans and enriches policy tables, trains a softmax gradient-boosted tree
//! model with stratified validation, and scores tables or live HTTP requests
//! against the saved artifact.

pub mod cli;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod serve;
pub mod utils;

pub use error::{PipelineError, Result};
