//! Chat completion backend

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;
use crate::{Error, Result};

/// A backend that turns a conversation history into one assistant reply
///
/// Injected at construction time so the session can run against a fake in
/// tests; the capability is simply absent when no provider is configured.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submit the full ordered history, receive one assistant reply
    async fn reply(&self, turns: &[Turn]) -> Result<String>;
}

#[derive(Serialize)]
struct WireTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireTurn<'a>>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenAI chat completions client
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl OpenAiChat {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, model: String, max_tokens: u32) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for chat".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn reply(&self, turns: &[Turn]) -> Result<String> {
        tracing::debug!(turns = turns.len(), model = %self.model, "issuing chat request");

        let request = ChatRequest {
            model: &self.model,
            messages: turns
                .iter()
                .map(|t| WireTurn { role: t.role.as_str(), content: &t.content })
                .collect(),
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Chat(format!("chat API error {status}: {body}")));
        }

        let result: ChatResponse = response.json().await?;
        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Chat("empty completion".to_string()))?;

        tracing::info!(reply = %content, "chat reply received");
        Ok(content)
    }
}
