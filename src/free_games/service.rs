use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use super::classifier::{classify, Classified};
use super::feed::{FeedFetcher, FeedItem, FeedSource};
use super::models::{CheckSummary, InsertOutcome, Platform};
use super::notifier::{DiscordNotifier, GameNotifier};
use super::repository;
use super::verifier::{SteamStoreClient, SweepSummary, VerificationOutcome, Verifier, VerifyError};
use crate::config::SentinelConfig;
use crate::util::db::Db;

const USER_AGENT: &str = concat!("steam-sentinel/", env!("CARGO_PKG_VERSION"));

/// Free-game discovery pipeline: feed -> classifier -> dedup gate -> notifier,
/// plus the Steam verification entry points.
///
/// Built once per process and shared as `Arc` with the scheduler and HTTP handlers.
pub struct FreeGameService {
    db: Db,
    feed: Arc<dyn FeedSource>,
    notifier: Arc<dyn GameNotifier>,
    verifier: Verifier,
}

impl FreeGameService {
    pub fn new(
        db: Db,
        feed: Arc<dyn FeedSource>,
        notifier: Arc<dyn GameNotifier>,
        verifier: Verifier,
    ) -> Self {
        Self {
            db,
            feed,
            notifier,
            verifier,
        }
    }

    /// Wire the HTTP-backed feed, Steam store client and Discord notifier from config.
    pub fn from_config(db: Db, cfg: &SentinelConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("build http client")?;

        let feed = Arc::new(FeedFetcher::new(http.clone(), cfg.feed_url.clone()));
        let notifier = Arc::new(DiscordNotifier::new(
            http.clone(),
            cfg.discord_webhook_url.clone(),
            cfg.discord_username.clone(),
        ));
        let store = Arc::new(SteamStoreClient::new(
            http,
            &cfg.steam_store_base_url,
            &cfg.steam_country,
        ));
        let verifier = Verifier::new(db.clone(), store, cfg.verify_request_delay);

        if !notifier.is_enabled() {
            info!("DISCORD_WEBHOOK_URL not set; new-game notifications disabled");
        }
        Ok(Self::new(db, feed, notifier, verifier))
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// One feed pass. Never fails: a feed error is logged and reported in the summary.
    pub async fn check_feed(&self) -> CheckSummary {
        let span = info_span!("free_games.check");
        async {
            let now = Utc::now();
            let mut expired_by_date = 0;
            match repository::expire_past_end_dates(&self.db, now).await {
                Ok(n) => expired_by_date = n,
                Err(err) => warn!(error = %err, "failed to expire promotions past their end date"),
            }

            let items = match self.feed.fetch_items().await {
                Ok(items) => items,
                Err(err) => {
                    warn!(error = %err, "free-games feed fetch failed; retrying next tick");
                    return CheckSummary {
                        expired_by_date,
                        error: Some(err.to_string()),
                        ..CheckSummary::default()
                    };
                }
            };

            let mut summary = self.process_items(&items, now).await;
            summary.expired_by_date = expired_by_date;
            info!(
                fetched = summary.fetched,
                epic_new = summary.epic_new,
                steam_new = summary.steam_new,
                duplicates = summary.duplicates,
                skipped = summary.skipped,
                expired_on_insert = summary.expired_on_insert,
                expired_by_date = summary.expired_by_date,
                notified = summary.notified,
                "free-games check complete"
            );
            summary
        }
        .instrument(span)
        .await
    }

    /// Classify, persist and announce a batch of feed items, in feed order.
    pub async fn process_items(&self, items: &[FeedItem], now: DateTime<Utc>) -> CheckSummary {
        let mut summary = CheckSummary {
            fetched: items.len(),
            ..CheckSummary::default()
        };

        for item in items {
            let game = match classify(item, now) {
                Classified::Epic(game) | Classified::Steam(game) => game,
                Classified::Other => {
                    debug!(title = %item.title, "feed item is not an Epic/Steam promotion");
                    summary.skipped += 1;
                    continue;
                }
            };

            match repository::find_existing(&self.db, &game).await {
                Ok(Some(_)) => {
                    summary.duplicates += 1;
                    continue;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(title = %game.title, error = %err, "dedup lookup failed");
                    summary.store_failures += 1;
                    continue;
                }
            }

            let record = match repository::insert(&self.db, &game, now).await {
                Ok(InsertOutcome::Inserted(record)) => record,
                Ok(InsertOutcome::Duplicate) => {
                    summary.duplicates += 1;
                    continue;
                }
                Err(err) => {
                    warn!(title = %game.title, error = %err, "failed to store free game");
                    summary.store_failures += 1;
                    continue;
                }
            };

            match record.platform {
                Platform::Epic => summary.epic_new += 1,
                Platform::Steam => summary.steam_new += 1,
            }
            info!(id = record.id, platform = %record.platform, title = %record.title, expired = record.is_expired, "new free game stored");

            if record.is_expired {
                summary.expired_on_insert += 1;
                continue;
            }
            if !self.notifier.is_enabled() {
                continue;
            }
            match self.notifier.notify_new_game(&record).await {
                Ok(()) => summary.notified += 1,
                Err(err) => {
                    warn!(id = record.id, title = %record.title, error = %err, "new free game notification failed");
                    summary.notify_failures += 1;
                }
            }
        }
        summary
    }

    pub async fn verify_all(&self) -> Result<SweepSummary> {
        self.verifier.verify_all().await
    }

    pub async fn verify_one(&self, id: i64) -> Result<VerificationOutcome, VerifyError> {
        self.verifier.verify_one(id).await
    }
}
