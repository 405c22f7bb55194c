//! Terminal helpers shared by the CLI flows

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
