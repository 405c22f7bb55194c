//! CLI module - argument parsing

mod args;

pub use args::{Cli, Commands, PredictArgs, ServeArgs, TrainArgs, ValidationKind};
