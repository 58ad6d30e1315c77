use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder, ResponseError};
use log::{error, info};
use serde::de::DeserializeOwned;
use serde_json::json;
use tera::Context;
use uuid::Uuid;

use crate::error::ApiError;
use crate::model::{build_messages, ProviderError};
use crate::web::models::{ChatRequest, TranslateRequest};
use crate::web::streaming::relay_events;
use crate::web::validation::{validate, Field};
use crate::AppState;

pub const TRANSLATE_INSTRUCTION: &str = "Translate the following from English into Italian";

// Index page handler
pub async fn index(data: web::Data<AppState>) -> impl Responder {
    let context = Context::new();
    match data.tera.render("index.html", &context) {
        Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
        Err(e) => {
            error!("Template error: {}", e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Fallback for any non-POST method on an API resource
pub async fn method_not_allowed() -> HttpResponse {
    ApiError::MethodNotAllowed.error_response()
}

// Chat API endpoint
pub async fn chat(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    // Chat takes only `message`; any `systemPrompt` in the body is ignored.
    let payload: ChatRequest = parse_json(&req, &body)?;
    let message = validate(Field::Message, payload.message.as_deref(), None)?;

    let request_id = Uuid::new_v4();
    info!("[{}] Chat request: {} characters", request_id, message.chars().count());

    let messages = build_messages(None, message);
    let envelope = data
        .model
        .model
        .invoke(&messages)
        .await
        .map_err(|e| provider_failure(request_id, "chat", e))?;

    Ok(HttpResponse::Ok().json(envelope))
}

// Translation API endpoint (English -> Italian)
pub async fn translate(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let payload: TranslateRequest = parse_json(&req, &body)?;
    let text = validate(Field::Text, payload.text.as_deref(), None)?;

    let request_id = Uuid::new_v4();
    info!("[{}] Translate request: {} characters", request_id, text.chars().count());

    let messages = build_messages(Some(TRANSLATE_INSTRUCTION), text);
    let envelope = data
        .model
        .model
        .invoke(&messages)
        .await
        .map_err(|e| provider_failure(request_id, "translate", e))?;

    Ok(HttpResponse::Ok().json(envelope))
}

// Streaming chat endpoint
pub async fn stream(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let payload: ChatRequest = parse_json(&req, &body)?;
    let system_prompt = payload.system_prompt.as_deref();
    let message = validate(Field::Message, payload.message.as_deref(), system_prompt)?;

    let request_id = Uuid::new_v4();
    info!("[{}] Stream request: {} characters", request_id, message.chars().count());

    let messages = build_messages(system_prompt, message);
    let events = relay_events(data.model.model.clone(), messages, request_id);

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(events))
}

/// Require a JSON content type, then decode the body.
fn parse_json<T: DeserializeOwned>(req: &HttpRequest, body: &[u8]) -> Result<T, ApiError> {
    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    if !is_json {
        return Err(ApiError::UnsupportedContentType);
    }

    serde_json::from_slice(body).map_err(|_| ApiError::MalformedBody)
}

fn provider_failure(request_id: Uuid, endpoint: &str, err: ProviderError) -> ApiError {
    error!("[{}] Error en {} API: {}", request_id, endpoint, err);
    ApiError::Internal
}
