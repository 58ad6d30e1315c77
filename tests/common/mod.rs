#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::web::Data;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use tera::Tera;
use tokio_util::sync::CancellationToken;

use chat_relay::config::RateLimitConfig;
use chat_relay::model::{
    ChatModel, ChunkStream, Message, ModelManager, ModelResponseEnvelope, ProviderError,
    StreamChunk, TokenUsage,
};
use chat_relay::web::rate_limit::RateLimiter;
use chat_relay::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Complete,
    FailOpen,
    FailMidStream,
    StallAfterChunks,
}

/// Provider double that replays fixed chunks and records every call.
pub struct ScriptedModel {
    chunks: Vec<String>,
    behaviour: Behaviour,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl ScriptedModel {
    pub fn new(chunks: &[&str], behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            behaviour,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(chunks: &[&str]) -> Arc<Self> {
        Self::new(chunks, Behaviour::Complete)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<Message> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn last_token(&self) -> Option<CancellationToken> {
        self.tokens.lock().unwrap().last().cloned()
    }

    fn record(&self, messages: &[Message]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
    }

    fn upstream_failure() -> ProviderError {
        ProviderError::Status {
            status: 429,
            body: "quota exceeded for project secret-project".to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponseEnvelope, ProviderError> {
        self.record(messages);
        if self.behaviour == Behaviour::FailOpen {
            return Err(Self::upstream_failure());
        }

        Ok(ModelResponseEnvelope {
            content: self.chunks.concat(),
            token_usage: Some(TokenUsage { prompt_tokens: 5, completion_tokens: 3, total_tokens: 8 }),
            finish_reason: Some("STOP".to_string()),
        })
    }

    async fn stream(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, ProviderError> {
        self.record(&messages);
        self.tokens.lock().unwrap().push(cancel);

        let chunks = stream::iter(
            self.chunks
                .clone()
                .into_iter()
                .map(|content| Ok::<_, ProviderError>(StreamChunk::new(content))),
        );

        let upstream: ChunkStream = match self.behaviour {
            Behaviour::FailOpen => return Err(Self::upstream_failure()),
            Behaviour::Complete => Box::pin(chunks),
            Behaviour::FailMidStream => Box::pin(chunks.chain(stream::once(async {
                Err(ProviderError::Decode("connection reset".to_string()))
            }))),
            Behaviour::StallAfterChunks => Box::pin(chunks.chain(stream::pending())),
        };
        Ok(upstream)
    }
}

pub fn app_state(model: Arc<ScriptedModel>) -> Data<AppState> {
    let tera = Tera::new("templates/**/*").unwrap();
    Data::new(AppState::new(
        tera,
        ModelManager { model },
        RateLimiter::new(&RateLimitConfig::default()),
    ))
}
