use anyhow::{Context, Result};
use std::sync::Arc;
use steam_sentinel::api::ApiServer;
use steam_sentinel::logging::{init_tracing, DEFAULT_FILTER};
use steam_sentinel::util::db::Db;
use steam_sentinel::util::env as env_util;
use steam_sentinel::{FreeGameService, Scheduler, SentinelConfig};
use tracing::info;

#[actix_web::main]
async fn main() -> Result<()> {
    // --- env & logging -------------------------------------------------------
    env_util::init_env();
    init_tracing(DEFAULT_FILTER)?;

    let cfg = SentinelConfig::from_env().context("invalid configuration")?;
    cfg.log_snapshot();

    // --- DB connect ----------------------------------------------------------
    let db = Db::connect(&cfg.database_url, cfg.db_max_connections)
        .await
        .context("Db::connect failed")?;
    info!(max_conns = cfg.db_max_connections, "database connected");

    // --- pipeline + background loops ------------------------------------------
    let service = Arc::new(FreeGameService::from_config(db.clone(), &cfg)?);
    let scheduler = Scheduler::start(service.clone(), cfg.scheduler_config());
    info!(
        tasks = scheduler.task_count(),
        check_interval_secs = cfg.check_interval.as_secs(),
        verify_on_startup = cfg.verify_on_startup,
        "scheduler started"
    );

    // --- HTTP server (returns on Ctrl+C) --------------------------------------
    let served = ApiServer::from_config(&cfg).run(db, service).await;

    info!("shutdown: stopping background tasks");
    scheduler.stop().await;
    info!("all tasks stopped; goodbye");
    served
}
