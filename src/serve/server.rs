//! HTTP front end: `/health` and `/predict`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::request::{recommend, AssessmentInput};
use crate::model::ModelArtifact;

/// Bind address of the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServeConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelArtifact>,
}

impl AppState {
    pub fn new(model: ModelArtifact) -> Self {
        Self {
            model: Arc::new(model),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictResponse {
    pub bundle_id: i64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

/// Every failure surfaces as a 500 carrying its message.
#[derive(Debug)]
pub struct ApiError {
    message: String,
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(error: E) -> Self {
        Self {
            message: error.into().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(detail = %self.message, "Request failed");
        let payload = Json(ErrorResponse {
            detail: self.message,
        });
        (StatusCode::INTERNAL_SERVER_ERROR, payload).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn handle_predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let input: AssessmentInput = serde_json::from_slice(&body)?;
    let today = Local::now().date_naive();
    let model = Arc::clone(&state.model);

    let bundle_id =
        tokio::task::spawn_blocking(move || recommend(&model, &input, today)).await??;
    Ok(Json(PredictResponse { bundle_id }))
}

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match addr.parse::<SocketAddr>() {
        Ok(socket_addr) => TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind listener on {socket_addr}")),
        Err(_) => TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}")),
    }
}

/// Serve `model` until Ctrl-C or SIGTERM.
pub async fn serve(model: ModelArtifact, config: &ServeConfig) -> Result<()> {
    let state = AppState::new(model);
    let app = build_router(state.clone());
    let listener = bind_listener(&config.addr()).await?;

    info!(
        addr = %config.addr(),
        features = state.model.feature_names().len(),
        classes = state.model.header.class_labels.len(),
        "Bundle advisor listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    drop(state);
    info!("Model released, server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
