mod gemini;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::GeminiConfig;

pub use gemini::GeminiModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Build the prompt for one exchange: an optional system message ahead of
/// the user message. An empty system prompt counts as absent.
pub fn build_messages(system_prompt: Option<&str>, user_message: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(user_message));
    messages
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Single-shot model output, returned to API callers as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponseEnvelope {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// One incremental piece of streamed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub content: String,
}

impl StreamChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode provider response: {0}")]
    Decode(String),
}

/// A hosted chat model. Implementations own their transport; callers only
/// see prompts in and envelopes or chunks out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponseEnvelope, ProviderError>;

    /// Open an incremental response. Chunks arrive in emission order; the
    /// stream ends when the provider finishes or `cancel` fires.
    async fn stream(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, ProviderError>;
}

/// Flatten a raw provider content value into display text.
///
/// Strings pass through, arrays are concatenated element by element (non-string
/// elements serialized as JSON), anything else is serialized whole.
pub fn normalize_chunk_content(raw: &Value) -> String {
    match raw {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
        other => other.to_string(),
    }
}

// Shared handle to the configured model
#[derive(Clone)]
pub struct ModelManager {
    pub model: Arc<dyn ChatModel>,
}

impl ModelManager {
    pub fn new(model: impl ChatModel + 'static) -> Self {
        Self { model: Arc::new(model) }
    }

    pub fn gemini(config: &GeminiConfig) -> anyhow::Result<Self> {
        Ok(Self::new(GeminiModel::new(config)?))
    }
}
