// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // Static segments go before `/{id}` so they are not captured by it
        .service(
            web::scope("/api/free-games")
                .route("", web::get().to(handlers::list))
                .route("/refresh", web::post().to(handlers::refresh))
                .route("/current", web::get().to(handlers::current))
                .route("/stats", web::get().to(handlers::stats))
                .route("/verify", web::post().to(handlers::verify_all))
                .route("/cleanup", web::delete().to(handlers::cleanup))
                .route("/{id}", web::get().to(handlers::get_one))
                .route("/{id}/claim", web::put().to(handlers::claim))
                .route("/{id}/verify", web::post().to(handlers::verify_one)),
        );
}
