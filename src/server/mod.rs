//! OpenAI-compatible HTTP front end (`server` feature).
//!
//! | Route                    | Auth | Body                                   |
//! |--------------------------|------|----------------------------------------|
//! | `POST /v1/audio/speech`  | yes  | audio bytes, MIME from the format table |
//! | `GET /v1/models`         | yes  | `{"models": [voice, ...]}`             |
//! | `GET /health`            | no   | status, version, backend               |
//!
//! Errors are always `{"error": "..."}` with 400 (request), 401 (auth),
//! 500 (inference / encoding) or 504 (inference timeout).

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{error::TtsError, pipeline::SynthesisPipeline};

mod auth;
pub mod config;
mod handlers;

pub use config::ServerArgs;

/// Shared per-process state; cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SynthesisPipeline>,
    /// `None` disables the bearer check.
    pub api_key: Option<Arc<str>>,
    pub infer_timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: Arc<SynthesisPipeline>, api_key: Option<String>, infer_timeout: Duration) -> Self {
        Self { pipeline, api_key: api_key.map(Arc::from), infer_timeout }
    }

    /// Validate configuration, load voices and model, build the pipeline.
    ///
    /// Everything fatal at start-up fails here: bad auth configuration,
    /// missing or empty voicepack directory, missing model, unknown default voice.
    pub fn from_args(args: &ServerArgs) -> Result<Self> {
        let api_key = args.required_api_key()?;
        if api_key.is_none() {
            warn!("API key enforcement is disabled");
        }

        let pipeline = args.model.build_pipeline()?;
        Ok(Self::new(Arc::new(pipeline), api_key, args.infer_timeout()))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/v1/audio/speech", post(handlers::speech))
        .route("/v1/models", get(handlers::models))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .merge(api)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C / SIGTERM, then drain in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!(%addr, "Kokoro TTS server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
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

// ─── Errors ──────────────────────────────────────────────────────────────────

/// `{"error": message}` with a status code.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self { status: StatusCode::UNAUTHORIZED, message: message.into() }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl From<TtsError> for ApiError {
    fn from(err: TtsError) -> Self {
        let status = match &err {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            TtsError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
