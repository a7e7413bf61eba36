//! Speech synthesis proxy
//!
//! Browser clients post plain text and get base64 MP3 back, so the
//! synthesis key never leaves the gateway.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::providers::SpeechSynthesizer;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/tts", post(synthesize))
        .route("/api/voice/capabilities", get(capabilities))
        .with_state(state)
}

/// Voice capabilities response
#[derive(Debug, Serialize)]
pub struct VoiceCapabilities {
    pub tts_available: bool,
    pub chat_available: bool,
}

/// Get voice capabilities
async fn capabilities(State(_state): State<Arc<ApiState>>) -> Json<VoiceCapabilities> {
    // Both proxies are constructed before the server starts, so their
    // presence is static
    Json(VoiceCapabilities {
        tts_available: true,
        chat_available: true,
    })
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// Synthesis response, MP3 bytes base64-encoded for JSON transport
#[derive(Debug, Serialize)]
pub struct SynthesizeResponse {
    pub audio: String,
}

/// Synthesize text to speech
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Json<SynthesizeResponse>, VoiceError> {
    if request.text.trim().is_empty() {
        return Err(VoiceError::InvalidArgument("text must be a non-empty string"));
    }

    let audio = state
        .synth
        .synthesize(&request.text)
        .await
        .map_err(|e| VoiceError::SynthesisFailed(e.to_string()))?;

    Ok(Json(SynthesizeResponse {
        audio: base64::engine::general_purpose::STANDARD.encode(audio),
    }))
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    InvalidArgument(&'static str),
    SynthesisFailed(String),
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::InvalidArgument(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_argument", msg.to_string())
            }
            Self::SynthesisFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody { code, message },
            }),
        )
            .into_response()
    }
}
