use actix_web::{middleware::from_fn, web};

use crate::web::handlers;
use crate::web::middleware::{rate_limit, security_headers};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .wrap(from_fn(rate_limit))
            .wrap(security_headers())
            .service(
                web::resource("/chat")
                    .route(web::post().to(handlers::chat))
                    .default_service(web::to(handlers::method_not_allowed)),
            )
            .service(
                web::resource("/translate")
                    .route(web::post().to(handlers::translate))
                    .default_service(web::to(handlers::method_not_allowed)),
            )
            .service(
                web::resource("/stream")
                    .route(web::post().to(handlers::stream))
                    .default_service(web::to(handlers::method_not_allowed)),
            ),
    )
    .route("/", web::get().to(handlers::index))
    .route("/health", web::get().to(handlers::health_check));
}
