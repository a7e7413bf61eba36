//! API endpoint integration tests
//!
//! Exercises the HTTP surface with a canned chat backend, no network or
//! audio hardware required.

use std::sync::Arc;

use astra_gateway::api::{ApiState, chat, health, voice};
use astra_gateway::conversation::Turn;
use astra_gateway::providers::{ChatBackend, TextToSpeech};
use astra_gateway::scene::AvatarDescriptor;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use secrecy::SecretString;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceExt;

/// Chat backend that replies with a fixed line
struct CannedChat;

#[async_trait::async_trait]
impl ChatBackend for CannedChat {
    async fn reply(&self, turns: &[Turn]) -> astra_gateway::Result<String> {
        Ok(format!("reply to {} turns", turns.len()))
    }
}

/// Chat backend that always fails
struct BrokenChat;

#[async_trait::async_trait]
impl ChatBackend for BrokenChat {
    async fn reply(&self, _turns: &[Turn]) -> astra_gateway::Result<String> {
        Err(astra_gateway::Error::Chat("upstream down".to_string()))
    }
}

/// Build a test router over the given chat backend
fn build_test_router(chat_backend: Arc<dyn ChatBackend>) -> Router {
    let synth = TextToSpeech::new_openai(
        SecretString::from("test-key"),
        "nova".to_string(),
        1.0,
        "tts-1-hd".to_string(),
    )
    .expect("tts construction");

    let (updates, _) = broadcast::channel(8);
    let (events, _events_rx) = mpsc::channel(8);

    let state = Arc::new(ApiState {
        chat: chat_backend,
        synth: Arc::new(synth),
        avatar: AvatarDescriptor::default(),
        updates,
        events,
    });

    Router::new()
        .merge(chat::router(state.clone()))
        .merge(voice::router(state))
        .merge(health::router())
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let router = build_test_router(Arc::new(CannedChat));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_chat_relay_returns_content() {
    let router = build_test_router(Arc::new(CannedChat));

    let body = serde_json::json!({"messages": [
        {"role": "system", "content": "be brief"},
        {"role": "user", "content": "hello"},
    ]});
    let response = router.oneshot(post_json("/api/chat", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["content"], "reply to 2 turns");
}

#[tokio::test]
async fn test_chat_relay_rejects_missing_messages() {
    let router = build_test_router(Arc::new(CannedChat));

    let response = router
        .oneshot(post_json("/api/chat", serde_json::json!({"text": "hi"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "invalid_argument");
}

#[tokio::test]
async fn test_chat_relay_rejects_non_array_messages() {
    let router = build_test_router(Arc::new(CannedChat));

    let response = router
        .oneshot(post_json(
            "/api/chat",
            serde_json::json!({"messages": "not an array"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_relay_maps_backend_failure_to_internal() {
    let router = build_test_router(Arc::new(BrokenChat));

    let body = serde_json::json!({"messages": [{"role": "user", "content": "hello"}]});
    let response = router.oneshot(post_json("/api/chat", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "internal");
}

#[tokio::test]
async fn test_tts_rejects_empty_text() {
    let router = build_test_router(Arc::new(CannedChat));

    let response = router
        .oneshot(post_json("/api/tts", serde_json::json!({"text": "  "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "invalid_argument");
}

#[tokio::test]
async fn test_voice_capabilities() {
    let router = build_test_router(Arc::new(CannedChat));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/voice/capabilities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["tts_available"], true);
    assert_eq!(json["chat_available"], true);
}
