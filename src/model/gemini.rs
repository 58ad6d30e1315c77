use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{
    normalize_chunk_content, ChatModel, ChunkStream, Message, ModelResponseEnvelope,
    ProviderError, Role, StreamChunk, TokenUsage,
};
use crate::config::GeminiConfig;
use crate::stream::{data_payload, LineDecoder};

// A wrapper for the Gemini generative language REST API
pub struct GeminiModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    temperature: f32,
}

impl GeminiModel {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder().build()?;

        info!("Using Gemini model {} at {}", config.model, config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn request_body<'a>(&self, messages: &'a [Message]) -> GenerateContentRequest<'a> {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for message in messages {
            let part = TextPart { text: &message.content };
            match message.role {
                Role::System => system_parts.push(part),
                Role::User => contents.push(Content { role: Some("user"), parts: vec![part] }),
            }
        }

        GenerateContentRequest {
            contents,
            system_instruction: (!system_parts.is_empty())
                .then(|| Content { role: None, parts: system_parts }),
            generation_config: GenerationConfig { temperature: self.temperature },
        }
    }

    async fn post(&self, url: &str, body: &GenerateContentRequest<'_>) -> Result<Response, ProviderError> {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    async fn invoke(&self, messages: &[Message]) -> Result<ModelResponseEnvelope, ProviderError> {
        let request = self.request_body(messages);
        let response = self.post(&self.endpoint("generateContent"), &request).await?;

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        if let Some(error) = parsed.error {
            return Err(ProviderError::Decode(format!("provider error payload: {}", error)));
        }

        let envelope = into_envelope(parsed);
        info!("Response length: {} characters", envelope.content.chars().count());
        Ok(envelope)
    }

    async fn stream(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, ProviderError> {
        let request = self.request_body(&messages);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let mut response = self.post(&url, &request).await?;

        let stream = async_stream::stream! {
            let mut decoder = LineDecoder::new();
            loop {
                let read = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Gemini stream cancelled before completion");
                        break;
                    }
                    read = response.chunk() => read,
                };

                let bytes = match read {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => {
                        // A last event may arrive without its terminating newline.
                        let rest = decoder.remainder().trim_end_matches('\r');
                        let tail = data_payload(rest).map(parse_event);
                        if let Some(event) = tail {
                            debug!("Gemini stream ended on an unterminated event");
                            let failed = event.is_err();
                            yield event;
                            if failed {
                                return;
                            }
                        }
                        break;
                    }
                    Err(e) => {
                        yield Err(ProviderError::Transport(e));
                        return;
                    }
                };

                for line in decoder.push(&bytes) {
                    let event = match data_payload(&line) {
                        Some(payload) => parse_event(payload),
                        None => continue,
                    };
                    let failed = event.is_err();
                    yield event;
                    if failed {
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

/// Raw content of the first candidate: one string when every part is text,
/// otherwise the parts as a mixed array.
fn raw_content(response: &GenerateContentResponse) -> Value {
    let parts = response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| content.parts.as_slice())
        .unwrap_or_default();

    let texts: Option<Vec<&str>> = parts.iter().map(part_text).collect();
    match texts {
        Some(texts) => Value::String(texts.concat()),
        None => Value::Array(
            parts
                .iter()
                .map(|part| match part_text(part) {
                    Some(text) => Value::String(text.to_string()),
                    None => part.clone(),
                })
                .collect(),
        ),
    }
}

/// Decode one streamed event. An error payload counts as a failure.
fn parse_event(payload: &str) -> Result<StreamChunk, ProviderError> {
    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(GenerateContentResponse { error: Some(error), .. }) => Err(ProviderError::Decode(
            format!("provider error event: {}", error),
        )),
        Ok(parsed) => Ok(StreamChunk::new(normalize_chunk_content(&raw_content(&parsed)))),
        Err(e) => Err(ProviderError::Decode(e.to_string())),
    }
}

fn part_text(part: &Value) -> Option<&str> {
    part.get("text").and_then(Value::as_str)
}

fn into_envelope(response: GenerateContentResponse) -> ModelResponseEnvelope {
    let content = normalize_chunk_content(&raw_content(&response));
    let finish_reason = response
        .candidates
        .first()
        .and_then(|candidate| candidate.finish_reason.clone());
    let token_usage = response.usage_metadata.map(|usage| TokenUsage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        total_tokens: usage.total_token_count,
    });

    ModelResponseEnvelope { content, token_usage, finish_reason }
}
