//! Route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::{error::TtsError, pipeline::SynthesisRequest};

use super::{ApiError, AppState};

/// OpenAI `audio/speech` body. Unknown fields (`model`, ...) are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct SpeechBody {
    input: Option<String>,
    voice: Option<String>,
    response_format: Option<String>,
    speed: Option<f32>,
}

impl SpeechBody {
    fn into_request(self) -> Result<SynthesisRequest, ApiError> {
        let text = self
            .input
            .ok_or_else(|| ApiError::bad_request("Missing 'input' in request body"))?;
        let mut request = SynthesisRequest::new(text);
        request.voice = self.voice;
        if let Some(format) = self.response_format {
            request.response_format = format;
        }
        if let Some(speed) = self.speed {
            request.speed = speed;
        }
        Ok(request)
    }
}

/// `POST /v1/audio/speech`
pub(crate) async fn speech(
    State(state): State<AppState>,
    payload: Result<Json<SpeechBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let request = body.into_request()?;
    debug!(
        voice = request.voice.as_deref().unwrap_or(""),
        format = %request.response_format,
        "Speech request"
    );

    let pipeline = Arc::clone(&state.pipeline);
    let job = tokio::task::spawn_blocking(move || pipeline.run(&request));
    let result = match tokio::time::timeout(state.infer_timeout, job).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_err)) => {
            error!("Synthesis task failed: {join_err}");
            return Err(ApiError::internal("An unexpected error occurred."));
        }
        Err(_) => {
            let err = TtsError::Timeout { secs: state.infer_timeout.as_secs() };
            error!("{err}");
            return Err(err.into());
        }
    };

    info!(
        voice = %result.voice,
        format = %result.format,
        bytes = result.audio.len(),
        seconds = result.pcm.duration_secs(),
        "Speech generated"
    );
    let disposition = format!("attachment; filename=\"speech.{}\"", result.format.extension());
    Ok((
        [(CONTENT_TYPE, result.mime_type().to_string()), (CONTENT_DISPOSITION, disposition)],
        result.audio,
    )
        .into_response())
}

/// `GET /v1/models`
pub(crate) async fn models(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "models": state.pipeline.voices() }))
}

/// `GET /health`
pub(crate) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.pipeline.backend_kind().to_string(),
        "sample_rate": state.pipeline.sample_rate(),
        "voices": state.pipeline.voices().len(),
    }))
}
