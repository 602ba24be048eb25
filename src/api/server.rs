// API server implementation using actix-web

use crate::api::{auth, handlers, middleware, routes};
use crate::config::SentinelConfig;
use crate::free_games::FreeGameService;
use crate::util::db::Db;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub api_secret: Option<String>,
    pub allowed_origins: String,
}

impl ApiServer {
    pub fn from_config(cfg: &SentinelConfig) -> Self {
        Self {
            host: cfg.api_host.clone(),
            port: cfg.api_port,
            api_secret: cfg.api_secret.clone(),
            allowed_origins: cfg.allowed_origins.clone(),
        }
    }

    /// Start the HTTP server; resolves when the server stops (Ctrl+C included).
    pub async fn run(self, db: Db, service: Arc<FreeGameService>) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            auth = self.api_secret.is_some(),
            "Starting steam-sentinel API server"
        );
        if self.api_secret.is_none() {
            tracing::warn!("API_SECRET not set; API endpoints are unauthenticated");
        }
        handlers::mark_started();

        let db_data = web::Data::new(db);
        let service_data = web::Data::from(service);
        let api_secret = self.api_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = auth::Auth::new(api_secret.clone());

            App::new()
                .app_data(db_data.clone())
                .app_data(service_data.clone())
                .wrap(auth)
                .wrap(cors)
                .wrap(compress)
                .wrap(logger)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
