//! HTTP API server for the astra gateway
//!
//! Exposes the provider proxies (chat relay, speech synthesis) so browser
//! clients never hold provider credentials, plus the avatar websocket
//! stream and health probes.

pub mod chat;
pub mod events;
pub mod health;
pub mod voice;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::conversation::ConversationEvent;
use crate::providers::{ChatBackend, TextToSpeech};
use crate::scene::AvatarDescriptor;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Chat completion backend the relay forwards to
    pub chat: Arc<dyn ChatBackend>,
    /// Speech synthesizer backing the TTS proxy
    pub synth: Arc<TextToSpeech>,
    /// Avatar asset advertised to connecting renderers
    pub avatar: AvatarDescriptor,
    /// Presentation stream fanned out to websocket clients
    pub updates: broadcast::Sender<events::WsOutgoing>,
    /// Conversation events fed back from websocket clients
    pub events: mpsc::Sender<ConversationEvent>,
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server for the given state and port
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Build the router with all routes
    fn router(&self) -> Router {
        let router = Router::new()
            .merge(chat::router(self.state.clone()))
            .merge(voice::router(self.state.clone()))
            .nest("/ws", events::router(self.state.clone()))
            .merge(health::router());

        // CORS layer for cross-origin requests from browser renderers
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
