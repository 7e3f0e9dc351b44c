// API route configuration

use crate::api::handlers;
use actix_web::web;

/// Only read-style GET triggers reach the engine; any other method on the
/// crawl resources is answered with 405 before anything runs.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/v1")
                .service(
                    web::resource("/crawl")
                        .route(web::get().to(handlers::run_crawl))
                        .default_service(web::to(handlers::method_not_allowed)),
                )
                .service(
                    web::resource("/crawl/status")
                        .route(web::get().to(handlers::crawl_status))
                        .default_service(web::to(handlers::method_not_allowed)),
                ),
        );
}
