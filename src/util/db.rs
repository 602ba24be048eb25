use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    /// Open (creating if needed) the file-backed database and apply pending migrations.
    // SECURITY: never include raw DSNs in tracing spans.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        ensure_parent_dir(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .context("invalid sqlite database url")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await
            .context("failed to open sqlite pool")?;
        info!("connected to db");

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema applied.
    ///
    /// Pinned to a single connection that never idles out: every sqlite
    /// `:memory:` connection is its own database.
    pub async fn connect_in_memory() -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .context("failed to open in-memory sqlite pool")?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Cheap connectivity check for health endpoints.
    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .context("failed to apply migrations")?;
        info!("migrations up-to-date");
        Ok(())
    }
}

/// sqlite creates the file but not its directory.
fn ensure_parent_dir(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_file_path(database_url) else {
        return Ok(());
    };
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// File path portion of a sqlite URL, `None` for in-memory databases.
fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" || rest.contains("mode=memory") {
        None
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_file_paths_from_sqlite_urls() {
        assert_eq!(
            sqlite_file_path("sqlite://data/steam_sentinel.db"),
            Some("data/steam_sentinel.db")
        );
        assert_eq!(
            sqlite_file_path("sqlite:data/sentinel.db?mode=rwc"),
            Some("data/sentinel.db")
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("sqlite://file.db?mode=memory"), None);
    }

    #[tokio::test]
    async fn in_memory_db_has_schema() {
        let db = Db::connect_in_memory().await.unwrap();
        assert!(db.ping().await);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM free_games")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
