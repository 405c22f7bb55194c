//! Report module - training summary and feature importance export

pub mod importance;
pub mod summary;

pub use importance::*;
pub use summary::*;
