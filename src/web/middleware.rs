use std::time::Instant;

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::{DefaultHeaders, Next},
    web::Data,
    Error, ResponseError,
};
use log::warn;

use crate::error::ApiError;
use crate::web::rate_limit::client_identifier;
use crate::AppState;

pub const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; script-src 'self' 'unsafe-eval' 'unsafe-inline'; style-src 'self' 'unsafe-inline';";

/// Headers attached to every `/api` response, rejections included.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Frame-Options", "DENY"))
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .add(("Content-Security-Policy", CONTENT_SECURITY_POLICY))
}

/// Reject clients over their per-window budget before any handler runs.
pub async fn rate_limit(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let client = client_identifier(req.headers(), req.peer_addr());

    let allowed = match req.app_data::<Data<AppState>>() {
        Some(state) => state.limiter.check_and_consume(&client, Instant::now()),
        None => {
            warn!("No application state registered, skipping rate limit");
            true
        }
    };

    if !allowed {
        warn!("Rate limit exceeded for client {} on {}", client, req.path());
        let response = ApiError::RateLimited.error_response();
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}
