use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, instrument};

use super::models::{FreeGameFilter, FreeGameRecord, FreeGameStats, InsertOutcome, NewFreeGame, Platform};
use crate::util::db::Db;

const SELECT_COLUMNS: &str = "SELECT id, platform, title, description, url, app_id, start_date, end_date, \
     is_claimed, claimed_at, is_expired, discovered_at, updated_at FROM free_games";

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;

#[instrument(skip(db))]
pub async fn find_by_title(db: &Db, platform: Platform, title: &str) -> Result<Option<FreeGameRecord>> {
    let row = sqlx::query_as::<_, FreeGameRecord>(&format!(
        "{SELECT_COLUMNS} WHERE platform = ? AND title = ? LIMIT 1"
    ))
    .bind(platform)
    .bind(title)
    .fetch_optional(&db.pool)
    .await?;
    Ok(row)
}

#[instrument(skip(db))]
pub async fn find_by_app_id(db: &Db, platform: Platform, app_id: i64) -> Result<Option<FreeGameRecord>> {
    let row = sqlx::query_as::<_, FreeGameRecord>(&format!(
        "{SELECT_COLUMNS} WHERE platform = ? AND app_id = ? LIMIT 1"
    ))
    .bind(platform)
    .bind(app_id)
    .fetch_optional(&db.pool)
    .await?;
    Ok(row)
}

/// Dedup lookup: Steam by app id, Epic by title.
pub async fn find_existing(db: &Db, game: &NewFreeGame) -> Result<Option<FreeGameRecord>> {
    match (game.platform, game.app_id) {
        (Platform::Steam, Some(app_id)) => find_by_app_id(db, Platform::Steam, app_id).await,
        (platform, _) => find_by_title(db, platform, &game.title).await,
    }
}

#[instrument(skip(db))]
pub async fn get(db: &Db, id: i64) -> Result<Option<FreeGameRecord>> {
    let row = sqlx::query_as::<_, FreeGameRecord>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&db.pool)
        .await?;
    Ok(row)
}

/// Insert a newly seen promotion; records already past their end date are stored as expired.
///
/// The dedup indexes turn a lost race into `InsertOutcome::Duplicate`.
#[instrument(skip(db, game), fields(platform = %game.platform, title = %game.title))]
pub async fn insert(db: &Db, game: &NewFreeGame, now: DateTime<Utc>) -> Result<InsertOutcome> {
    let row = sqlx::query_as::<_, FreeGameRecord>(
        r#"
        INSERT INTO free_games
            (platform, title, description, url, app_id, start_date, end_date,
             is_claimed, claimed_at, is_expired, discovered_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?, ?)
        ON CONFLICT DO NOTHING
        RETURNING id, platform, title, description, url, app_id, start_date, end_date,
                  is_claimed, claimed_at, is_expired, discovered_at, updated_at
        "#,
    )
    .bind(game.platform)
    .bind(&game.title)
    .bind(&game.description)
    .bind(&game.url)
    .bind(game.app_id)
    .bind(game.start_date)
    .bind(game.end_date)
    .bind(game.is_expired_at(now))
    .bind(now)
    .bind(now)
    .fetch_optional(&db.pool)
    .await
    .context("insert free game")?;

    Ok(match row {
        Some(record) => InsertOutcome::Inserted(record),
        None => {
            debug!("free game already stored (constraint)");
            InsertOutcome::Duplicate
        }
    })
}

/// Non-expired promotions, newest first.
#[instrument(skip(db))]
pub async fn list_current(db: &Db) -> Result<Vec<FreeGameRecord>> {
    let rows = sqlx::query_as::<_, FreeGameRecord>(&format!(
        "{SELECT_COLUMNS} WHERE is_expired = 0 ORDER BY discovered_at DESC, id DESC"
    ))
    .fetch_all(&db.pool)
    .await?;
    Ok(rows)
}

#[instrument(skip(db))]
pub async fn list(db: &Db, filter: &FreeGameFilter) -> Result<Vec<FreeGameRecord>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
    qb.push(" WHERE 1 = 1");
    if let Some(platform) = filter.platform {
        qb.push(" AND platform = ").push_bind(platform);
    }
    if !filter.include_expired {
        qb.push(" AND is_expired = 0");
    }
    if let Some(claimed) = filter.claimed {
        qb.push(" AND is_claimed = ").push_bind(claimed);
    }
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let offset = filter.offset.unwrap_or(0).max(0);
    qb.push(" ORDER BY discovered_at DESC, id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb
        .build_query_as::<FreeGameRecord>()
        .fetch_all(&db.pool)
        .await?;
    Ok(rows)
}

#[instrument(skip(db))]
pub async fn stats(db: &Db, now: DateTime<Utc>) -> Result<FreeGameStats> {
    let since = now - Duration::days(30);
    let stats = sqlx::query_as::<_, FreeGameStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN is_expired = 0 THEN 1 ELSE 0 END), 0) AS active,
            COALESCE(SUM(CASE WHEN is_expired = 1 THEN 1 ELSE 0 END), 0) AS expired,
            COALESCE(SUM(CASE WHEN is_claimed = 1 THEN 1 ELSE 0 END), 0) AS claimed,
            COALESCE(SUM(CASE WHEN platform = 'epic' THEN 1 ELSE 0 END), 0) AS epic,
            COALESCE(SUM(CASE WHEN platform = 'steam' THEN 1 ELSE 0 END), 0) AS steam,
            COALESCE(SUM(CASE WHEN is_claimed = 1 AND claimed_at >= ? THEN 1 ELSE 0 END), 0)
                AS claimed_last_30_days
        FROM free_games
        "#,
    )
    .bind(since)
    .fetch_one(&db.pool)
    .await?;
    Ok(stats)
}

/// Set the claimed flag; `claimed_at` follows it. `None` when the id is unknown.
#[instrument(skip(db))]
pub async fn set_claimed(
    db: &Db,
    id: i64,
    claimed: bool,
    now: DateTime<Utc>,
) -> Result<Option<FreeGameRecord>> {
    let claimed_at = claimed.then_some(now);
    let row = sqlx::query_as::<_, FreeGameRecord>(
        r#"
        UPDATE free_games
        SET is_claimed = ?, claimed_at = ?, updated_at = ?
        WHERE id = ?
        RETURNING id, platform, title, description, url, app_id, start_date, end_date,
                  is_claimed, claimed_at, is_expired, discovered_at, updated_at
        "#,
    )
    .bind(claimed)
    .bind(claimed_at)
    .bind(now)
    .bind(id)
    .fetch_optional(&db.pool)
    .await?;
    Ok(row)
}

/// Flip the claimed flag. `None` when the id is unknown.
pub async fn toggle_claimed(db: &Db, id: i64, now: DateTime<Utc>) -> Result<Option<FreeGameRecord>> {
    match get(db, id).await? {
        Some(record) => set_claimed(db, id, !record.is_claimed, now).await,
        None => Ok(None),
    }
}

/// Returns true when the row changed.
#[instrument(skip(db))]
pub async fn mark_expired(db: &Db, id: i64, now: DateTime<Utc>) -> Result<bool> {
    let res = sqlx::query(
        "UPDATE free_games SET is_expired = 1, updated_at = ? WHERE id = ? AND is_expired = 0",
    )
    .bind(now)
    .bind(id)
    .execute(&db.pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Expire active promotions whose end date has passed. Returns rows updated.
#[instrument(skip(db))]
pub async fn expire_past_end_dates(db: &Db, now: DateTime<Utc>) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE free_games SET is_expired = 1, updated_at = ? \
         WHERE is_expired = 0 AND end_date IS NOT NULL AND end_date < ?",
    )
    .bind(now)
    .bind(now)
    .execute(&db.pool)
    .await?;
    Ok(res.rows_affected())
}

/// Active Steam promotions that can be checked against the store.
#[instrument(skip(db))]
pub async fn active_steam(db: &Db) -> Result<Vec<FreeGameRecord>> {
    let rows = sqlx::query_as::<_, FreeGameRecord>(&format!(
        "{SELECT_COLUMNS} WHERE platform = 'steam' AND is_expired = 0 AND app_id IS NOT NULL ORDER BY id"
    ))
    .fetch_all(&db.pool)
    .await?;
    Ok(rows)
}

/// Delete unclaimed records discovered more than `days` ago. Claimed records are kept.
#[instrument(skip(db))]
pub async fn cleanup_older_than(db: &Db, days: i64, now: DateTime<Utc>) -> Result<u64> {
    let cutoff = now - Duration::days(days);
    let res = sqlx::query("DELETE FROM free_games WHERE is_claimed = 0 AND discovered_at < ?")
        .bind(cutoff)
        .execute(&db.pool)
        .await?;
    Ok(res.rows_affected())
}
