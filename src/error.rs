//! HTTP error handling and response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::web::models::ErrorResponse;
use crate::web::validation::ValidationError;

/// Failures surfaced to API callers. Every variant renders as
/// `{"error": "<message>"}`; server-side causes are logged before they are
/// collapsed into [`ApiError::Internal`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Content-Type debe ser application/json")]
    UnsupportedContentType,

    #[error("Cuerpo JSON inválido")]
    MalformedBody,

    #[error("Método no permitido")]
    MethodNotAllowed,

    #[error("Demasiadas solicitudes. Intenta de nuevo en 1 minuto.")]
    RateLimited,

    #[error("Error interno del servidor")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::UnsupportedContentType | ApiError::MalformedBody => {
                StatusCode::BAD_REQUEST
            }
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
