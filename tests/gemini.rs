//! Gemini REST client against a mock server.

use futures::StreamExt;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chat_relay::config::GeminiConfig;
use chat_relay::model::{
    build_messages, ChatModel, GeminiModel, ModelResponseEnvelope, ProviderError, TokenUsage,
};

const GENERATE: &str = "/models/gemini-2.0-flash:generateContent";
const STREAM: &str = "/models/gemini-2.0-flash:streamGenerateContent";

fn model_for(server: &MockServer) -> GeminiModel {
    GeminiModel::new(&GeminiConfig {
        api_key: SecretString::new("test-key".to_string()),
        model: "gemini-2.0-flash".to_string(),
        base_url: server.uri(),
        temperature: 0.0,
    })
    .unwrap()
}

fn sse_event(text: &str) -> String {
    let payload = json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    });
    format!("data: {}\r\n\r\n", payload)
}

#[tokio::test]
async fn invoke_maps_response_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Translate the following from English into Italian"}]},
            "contents": [{"role": "user", "parts": [{"text": "Hello"}]}],
            "generationConfig": {"temperature": 0.0}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Ciao"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 2, "totalTokenCount": 11}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let messages = build_messages(
        Some("Translate the following from English into Italian"),
        "Hello",
    );
    let envelope = model_for(&server).invoke(&messages).await.unwrap();

    assert_eq!(
        envelope,
        ModelResponseEnvelope {
            content: "Ciao".to_string(),
            token_usage: Some(TokenUsage { prompt_tokens: 9, completion_tokens: 2, total_tokens: 11 }),
            finish_reason: Some("STOP".to_string()),
        }
    );
}

#[tokio::test]
async fn invoke_surfaces_status_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .mount(&server)
        .await;

    let err = model_for(&server)
        .invoke(&build_messages(None, "Hola"))
        .await
        .unwrap_err();

    match err {
        ProviderError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "RESOURCE_EXHAUSTED");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn stream_yields_chunks_in_order() {
    let server = MockServer::start().await;
    let body = [sse_event("Hola "), sse_event("mun"), sse_event("do")].concat();
    Mock::given(method("POST"))
        .and(path(STREAM))
        .and(query_param("alt", "sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let chunks = model_for(&server)
        .stream(build_messages(None, "Saluda"), CancellationToken::new())
        .await
        .unwrap();
    let contents: Vec<String> = chunks.map(|chunk| chunk.unwrap().content).collect().await;

    assert_eq!(contents, vec!["Hola ", "mun", "do"]);
    assert_eq!(contents.concat(), "Hola mundo");
}

#[tokio::test]
async fn stream_keeps_final_event_without_terminator() {
    let server = MockServer::start().await;
    let last = sse_event("do");
    let body = format!("{}{}", sse_event("Hola mun"), last.trim_end());
    Mock::given(method("POST"))
        .and(path(STREAM))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let contents: Vec<String> = model_for(&server)
        .stream(build_messages(None, "Saluda"), CancellationToken::new())
        .await
        .unwrap()
        .map(|chunk| chunk.unwrap().content)
        .collect()
        .await;

    assert_eq!(contents, vec!["Hola mun", "do"]);
}

#[tokio::test]
async fn stream_reports_undecodable_event() {
    let server = MockServer::start().await;
    let body = format!("{}data: {{broken\r\n\r\n", sse_event("ok"));
    Mock::given(method("POST"))
        .and(path(STREAM))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let results: Vec<_> = model_for(&server)
        .stream(build_messages(None, "Hola"), CancellationToken::new())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().content, "ok");
    assert!(matches!(results[1], Err(ProviderError::Decode(_))));
}

#[tokio::test]
async fn cancelled_stream_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_event("late"), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let chunks = model_for(&server)
        .stream(build_messages(None, "Hola"), cancel.clone())
        .await
        .unwrap();
    cancel.cancel();

    let results: Vec<_> = chunks.collect().await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn stream_open_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let result = model_for(&server)
        .stream(build_messages(None, "Hola"), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ProviderError::Status { status: 403, .. })));
}
