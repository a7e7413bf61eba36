//! Avatar WebSocket stream
//!
//! Each connected renderer receives the shared presentation stream: phase
//! changes, per-frame morph weights and head rotation, subtitle reveals,
//! and status lines. Incoming messages let a browser that does its own
//! capture and playback drive the conversation from the client side.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::ApiState;
use crate::conversation::ConversationEvent;
use crate::scene::{AvatarDescriptor, AvatarFrame};

/// Incoming WebSocket message from a renderer
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// Begin the conversation (one-shot)
    Start,
    /// Interim transcript from client-side capture
    TranscriptUpdate { text: String },
    /// Final transcript from client-side capture
    TranscriptFinal { text: String },
    /// Client-side playback finished
    SpeechEnded,
    /// Ping to keep connection alive
    Ping,
}

/// Outgoing WebSocket message to a renderer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    /// Connection established
    Connected {
        session_id: String,
        avatar: AvatarDescriptor,
    },
    /// Conversation phase changed
    Phase { phase: &'static str },
    /// One frame of avatar state
    Frame {
        #[serde(flatten)]
        frame: AvatarFrame,
    },
    /// Reply text for the renderer to synthesize and play itself, sent
    /// only when local voice output is disabled
    Speak { text: String },
    /// Subtitle text visible right now
    Subtitle { text: String },
    /// Transient status line (errors, retry notices)
    Status { message: String },
    /// Pong response
    Pong,
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/avatar", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let session_id = uuid::Uuid::new_v4().to_string();

    let connected = WsOutgoing::Connected {
        session_id: session_id.clone(),
        avatar: state.avatar.clone(),
    };
    if let Ok(msg) = serde_json::to_string(&connected) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    tracing::info!(session_id = %session_id, "renderer connected");

    let mut updates = state.updates.subscribe();

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(msg) => {
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                }
                // Slow consumer dropped frames; keep streaming from here
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(session_id = %session_id, skipped, "renderer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_message(&text, &state).await {
                        if let Ok(text) = serde_json::to_string(&reply) {
                            if sender.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(session_id = %session_id, "renderer disconnected");
}

/// Handle a single incoming message, returning a direct reply if any
async fn handle_message(text: &str, state: &Arc<ApiState>) -> Option<WsOutgoing> {
    let incoming: WsIncoming = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed renderer message");
            return None;
        }
    };

    let event = match incoming {
        WsIncoming::Ping => return Some(WsOutgoing::Pong),
        WsIncoming::Start => ConversationEvent::Start,
        WsIncoming::TranscriptUpdate { text } => ConversationEvent::TranscriptUpdate(text),
        WsIncoming::TranscriptFinal { text } => ConversationEvent::TranscriptFinal(text),
        WsIncoming::SpeechEnded => ConversationEvent::SpeechEnded,
    };

    if state.events.send(event).await.is_err() {
        tracing::warn!("conversation loop gone, dropping renderer event");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_messages_parse_from_tagged_json() {
        let msg: WsIncoming = serde_json::from_str(r#"{"type":"start"}"#).unwrap();
        assert!(matches!(msg, WsIncoming::Start));

        let msg: WsIncoming =
            serde_json::from_str(r#"{"type":"transcript_final","text":"hello"}"#).unwrap();
        assert!(matches!(msg, WsIncoming::TranscriptFinal { text } if text == "hello"));
    }

    #[test]
    fn outgoing_frame_serializes_weights_by_name() {
        use crate::lipsync::{HeadSway, MorphWeights};

        let mut weights = MorphWeights::default();
        weights.set("mouthOpen", 0.5);
        let frame = WsOutgoing::Frame {
            frame: AvatarFrame {
                weights,
                head: HeadSway {
                    yaw: 0.01,
                    pitch: 0.0,
                },
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "frame");
        assert!((json["weights"]["mouthOpen"].as_f64().unwrap() - 0.5).abs() < 1e-6);
        assert!((json["head"]["yaw"].as_f64().unwrap() - 0.01).abs() < 1e-6);
    }
}
