use tera::Tera;

use crate::model::ModelManager;
use crate::web::rate_limit::RateLimiter;

// Shared application state, one instance per process
pub struct AppState {
    pub tera: Tera,
    pub model: ModelManager,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(tera: Tera, model: ModelManager, limiter: RateLimiter) -> Self {
        Self { tera, model, limiter }
    }
}
