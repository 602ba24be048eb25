// HTTP request handlers for the free-games endpoints

use crate::api::error::ApiError;
use crate::api::models::*;
use crate::config::DEFAULT_RETENTION_DAYS;
use crate::free_games::{repository, FreeGameFilter, FreeGameService};
use crate::util::db::Db;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use std::sync::OnceLock;
use std::time::Instant;

type HandlerResult = Result<HttpResponse, ApiError>;

static STARTED: OnceLock<Instant> = OnceLock::new();

/// Pin the uptime origin; later calls are no-ops.
pub fn mark_started() {
    STARTED.get_or_init(Instant::now);
}

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> HttpResponse {
    let db_status = if db.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: STARTED.get_or_init(Instant::now).elapsed().as_secs(),
    });

    HttpResponse::Ok().json(response)
}

/// Run one feed pass now
pub async fn refresh(service: web::Data<FreeGameService>) -> HandlerResult {
    tracing::info!("manual free-games refresh requested");
    let summary = service.check_feed().await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

pub async fn current(service: web::Data<FreeGameService>) -> HandlerResult {
    let games = repository::list_current(service.db()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(games)))
}

pub async fn list(
    service: web::Data<FreeGameService>,
    query: web::Query<FreeGameFilter>,
) -> HandlerResult {
    let games = repository::list(service.db(), &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(games)))
}

pub async fn stats(service: web::Data<FreeGameService>) -> HandlerResult {
    let stats = repository::stats(service.db(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

pub async fn get_one(service: web::Data<FreeGameService>, path: web::Path<i64>) -> HandlerResult {
    let id = path.into_inner();
    let game = repository::get(service.db(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("free game {id} not found")))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(game)))
}

/// Set or toggle the claimed flag. An empty body toggles; a body must be a valid `ClaimRequest`.
pub async fn claim(
    service: web::Data<FreeGameService>,
    path: web::Path<i64>,
    body: web::Bytes,
) -> HandlerResult {
    let id = path.into_inner();
    let claimed = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<ClaimRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid claim body: {e}")))?
            .claimed
    };
    let now = Utc::now();
    let updated = match claimed {
        Some(claimed) => repository::set_claimed(service.db(), id, claimed, now).await?,
        None => repository::toggle_claimed(service.db(), id, now).await?,
    };
    let game = updated.ok_or_else(|| ApiError::NotFound(format!("free game {id} not found")))?;
    tracing::info!(id, claimed = game.is_claimed, "free game claim updated");
    Ok(HttpResponse::Ok().json(ApiResponse::success(game)))
}

/// Run a verification sweep over every active Steam record
pub async fn verify_all(service: web::Data<FreeGameService>) -> HandlerResult {
    let summary = service.verify_all().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

pub async fn verify_one(
    service: web::Data<FreeGameService>,
    path: web::Path<i64>,
) -> HandlerResult {
    let outcome = service.verify_one(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(outcome)))
}

/// Delete unclaimed records older than `days` (claimed ones are kept)
pub async fn cleanup(
    service: web::Data<FreeGameService>,
    query: web::Query<CleanupQuery>,
) -> HandlerResult {
    let days = query.days.unwrap_or(DEFAULT_RETENTION_DAYS);
    if days < 1 {
        return Err(ApiError::BadRequest("days must be at least 1".to_string()));
    }
    let deleted = repository::cleanup_older_than(service.db(), days, Utc::now()).await?;
    tracing::info!(days, deleted, "free-games cleanup");
    Ok(HttpResponse::Ok().json(ApiResponse::success(CleanupResponse { days, deleted })))
}
