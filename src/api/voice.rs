//! Voice API endpoints for speech-to-text and text-to-speech

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};

use super::ApiState;
use super::error::ApiError;
use crate::protocol::{SynthesizeRequest, TranscribeResponse};

/// Upload cap for recorded clips (Whisper's own limit)
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Longest text accepted for synthesis
const MAX_SYNTH_CHARS: usize = 4096;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/transcribe", post(transcribe))
        .route("/api/synthesize", post(synthesize))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
        .with_state(state)
}

/// Transcribe an uploaded clip
///
/// Multipart form: `file` (WAV audio) and optional `language`.
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let stt = state
        .stt
        .as_ref()
        .ok_or(ApiError::NotConfigured("speech-to-text is not configured"))?;

    let mut audio = None;
    let mut language = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                audio = Some(bytes);
            }
            Some("language") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                language = Some(text.trim().to_string()).filter(|l| !l.is_empty());
            }
            _ => {}
        }
    }

    let audio = audio
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing audio file".to_string()))?;

    tracing::debug!(audio_bytes = audio.len(), language = ?language, "transcribe request");
    let text = stt.transcribe(&audio, language.as_deref()).await?;

    Ok(Json(TranscribeResponse { text }))
}

/// Synthesize text to speech
///
/// Returns audio in MP3 format
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    let tts = state
        .tts
        .as_ref()
        .ok_or(ApiError::NotConfigured("text-to-speech is not configured"))?;

    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("empty text".to_string()));
    }
    if text.chars().count() > MAX_SYNTH_CHARS {
        return Err(ApiError::BadRequest(format!(
            "text exceeds {MAX_SYNTH_CHARS} characters"
        )));
    }

    let audio = tts
        .synthesize(
            text,
            request.voice.as_deref(),
            request.speed,
            request.language.as_deref(),
        )
        .await?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}
