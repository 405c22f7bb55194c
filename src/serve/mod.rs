//! Serving adapter: questionnaire translation and the HTTP server

pub mod request;
pub mod server;

pub use request::{recommend, AssessmentInput};
pub use server::{build_router, serve, AppState, ServeConfig};
