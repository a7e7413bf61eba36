//! Chat relay endpoint
//!
//! Forwards a full message history to the configured chat backend and
//! returns the single assistant reply. Keeps provider credentials on the
//! gateway side of the wire.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use super::ApiState;
use crate::conversation::Turn;

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/chat", post(relay))
        .with_state(state)
}

/// Chat relay response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
}

/// Relay a message history to the chat backend
///
/// The body must carry `messages` as an array of `{role, content}` turns;
/// the full history travels on every call, the backend holds no state.
async fn relay(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ChatResponse>, ChatError> {
    let turns = parse_turns(&body)?;

    let content = state
        .chat
        .reply(&turns)
        .await
        .map_err(|e| ChatError::Upstream(e.to_string()))?;

    Ok(Json(ChatResponse { content }))
}

/// Validate the request body into conversation turns
fn parse_turns(body: &serde_json::Value) -> Result<Vec<Turn>, ChatError> {
    let messages = body
        .get("messages")
        .and_then(serde_json::Value::as_array)
        .ok_or(ChatError::InvalidArgument(
            "messages must be a non-empty array",
        ))?;

    if messages.is_empty() {
        return Err(ChatError::InvalidArgument(
            "messages must be a non-empty array",
        ));
    }

    messages
        .iter()
        .map(|message| {
            let role = message.get("role").and_then(serde_json::Value::as_str);
            let content = message.get("content").and_then(serde_json::Value::as_str);
            match (role, content) {
                (Some("system"), Some(content)) => Ok(Turn::system(content)),
                (Some("user"), Some(content)) => Ok(Turn::user(content)),
                (Some("assistant"), Some(content)) => Ok(Turn::assistant(content)),
                _ => Err(ChatError::InvalidArgument(
                    "each message needs a role and string content",
                )),
            }
        })
        .collect()
}

/// Chat relay errors
#[derive(Debug)]
pub enum ChatError {
    InvalidArgument(&'static str),
    Upstream(String),
}

impl IntoResponse for ChatError {
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
            Self::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[test]
    fn rejects_missing_messages() {
        let body = serde_json::json!({"other": 1});
        assert!(matches!(
            parse_turns(&body),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_non_array_messages() {
        let body = serde_json::json!({"messages": "hello"});
        assert!(matches!(
            parse_turns(&body),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_empty_messages() {
        let body = serde_json::json!({"messages": []});
        assert!(matches!(
            parse_turns(&body),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_unknown_roles() {
        let body = serde_json::json!({"messages": [{"role": "tool", "content": "x"}]});
        assert!(matches!(
            parse_turns(&body),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parses_a_valid_history() {
        let body = serde_json::json!({"messages": [
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"},
        ]});
        let turns = parse_turns(&body).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[2].content, "hello");
    }
}
