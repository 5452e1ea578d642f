use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// POST /api/v1/audio/tts
/// Returns the spoken form of a message as MP3 bytes.
pub async fn handle_synthesize(
    State(state): State<AppState>,
    Json(req): Json<SynthesizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::Validation("text must not be empty".to_string()));
    }

    let audio = state
        .speech
        .synthesize(&req.text)
        .await
        .map_err(|e| AppError::Speech(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "audio/mpeg")],
        audio,
    ))
}
