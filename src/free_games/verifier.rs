use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{FreeGameRecord, Platform};
use super::repository;
use crate::util::db::Db;

/// Store verdict for one app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Free,
    Paid,
    Unreleased,
    Removed,
}

impl VerificationStatus {
    pub fn is_free(self) -> bool {
        matches!(self, VerificationStatus::Free)
    }
}

/// `appdetails` entry for a single app id.
#[derive(Debug, Clone, Deserialize)]
pub struct AppDetails {
    pub success: bool,
    #[serde(default)]
    pub data: Option<AppData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub is_free: Option<bool>,
    #[serde(default)]
    pub price_overview: Option<PriceOverview>,
    #[serde(default)]
    pub release_date: Option<ReleaseDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceOverview {
    #[serde(rename = "final")]
    pub final_price: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDate {
    #[serde(default)]
    pub coming_soon: bool,
}

/// Store-details lookup keyed by Steam app id.
///
/// `Ok(None)` means the store answered without an entry for the id.
#[async_trait]
pub trait StoreDetails: Send + Sync {
    async fn app_details(&self, app_id: i64) -> Result<Option<AppDetails>>;
}

/// Steam storefront `appdetails` client.
#[derive(Debug, Clone)]
pub struct SteamStoreClient {
    http: Client,
    base_url: String,
    country: String,
}

impl SteamStoreClient {
    pub fn new(http: Client, base_url: &str, country: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            country: country.to_string(),
        }
    }
}

#[async_trait]
impl StoreDetails for SteamStoreClient {
    async fn app_details(&self, app_id: i64) -> Result<Option<AppDetails>> {
        let url = format!("{}/api/appdetails", self.base_url);
        let app_id_str = app_id.to_string();
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(&[("appids", app_id_str.as_str()), ("cc", self.country.as_str())])
            .send()
            .await
            .with_context(|| format!("appdetails request failed for {app_id}"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("appdetails returned HTTP {} for {}", status, app_id);
        }

        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("appdetails body was not JSON for {app_id}"))?;
        parse_app_details(&body, app_id)
    }
}

/// Pull the entry for `app_id` out of an `appdetails` response body.
pub fn parse_app_details(body: &Value, app_id: i64) -> Result<Option<AppDetails>> {
    let Some(entry) = body.get(app_id.to_string()) else {
        return Ok(None);
    };
    if entry.is_null() {
        return Ok(None);
    }
    let success = entry
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !success {
        return Ok(Some(AppDetails {
            success,
            data: None,
        }));
    }
    // Steam sends `data: []` for some lookups; a successful answer without an object is no answer.
    let data = match entry.get("data") {
        Some(v) if v.is_object() => serde_json::from_value::<AppData>(v.clone())
            .with_context(|| format!("unexpected appdetails data for {app_id}"))?,
        _ => return Ok(None),
    };
    Ok(Some(AppDetails {
        success,
        data: Some(data),
    }))
}

/// Map an `appdetails` entry to a verdict.
///
/// `None` when the store reported success but sent no app data; callers treat
/// that like a failed lookup.
pub fn classify_details(details: &AppDetails) -> Option<VerificationStatus> {
    if !details.success {
        return Some(VerificationStatus::Removed);
    }
    let data = details.data.as_ref()?;
    if data.release_date.as_ref().is_some_and(|r| r.coming_soon) {
        return Some(VerificationStatus::Unreleased);
    }
    if data.is_free == Some(true) {
        return Some(VerificationStatus::Free);
    }
    match data.price_overview.as_ref().and_then(|p| p.final_price) {
        Some(0) => Some(VerificationStatus::Free),
        _ => Some(VerificationStatus::Paid),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub verified: usize,
    pub still_free: usize,
    pub expired: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub id: i64,
    pub app_id: i64,
    pub status: VerificationStatus,
    pub expired: bool,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("free game {0} not found")]
    NotFound(i64),

    #[error("free game {0} is not a Steam listing")]
    NotSteam(i64),

    #[error("store lookup failed for app {app_id}: {message}")]
    Store { app_id: i64, message: String },

    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// Re-checks stored Steam promotions against the live store.
#[derive(Clone)]
pub struct Verifier {
    db: Db,
    store: Arc<dyn StoreDetails>,
    request_delay: Duration,
}

impl Verifier {
    pub fn new(db: Db, store: Arc<dyn StoreDetails>, request_delay: Duration) -> Self {
        Self {
            db,
            store,
            request_delay,
        }
    }

    /// Check every active Steam record, one call at a time with a fixed pause between calls.
    ///
    /// Failed or empty lookups are counted and leave the record alone; the sweep always
    /// runs to the end.
    pub async fn verify_all(&self) -> Result<SweepSummary> {
        let records = repository::active_steam(&self.db).await?;
        info!(records = records.len(), "steam verification sweep starting");
        let summary = self.sweep(&records).await;
        info!(
            verified = summary.verified,
            still_free = summary.still_free,
            expired = summary.expired,
            errors = summary.errors,
            "steam verification sweep complete"
        );
        Ok(summary)
    }

    pub(crate) async fn sweep(&self, records: &[FreeGameRecord]) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for (idx, record) in records.iter().enumerate() {
            if idx > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            let Some(app_id) = record.app_id else {
                continue;
            };

            let status = match self
                .store
                .app_details(app_id)
                .await
                .map(|d| d.as_ref().and_then(classify_details))
            {
                Ok(Some(status)) => status,
                Ok(None) => {
                    warn!(id = record.id, app_id, "appdetails returned no data");
                    summary.errors += 1;
                    continue;
                }
                Err(err) => {
                    warn!(id = record.id, app_id, error = %err, "appdetails lookup failed");
                    summary.errors += 1;
                    continue;
                }
            };

            summary.verified += 1;
            if status.is_free() {
                summary.still_free += 1;
                continue;
            }
            match repository::mark_expired(&self.db, record.id, Utc::now()).await {
                Ok(_) => {
                    info!(id = record.id, app_id, title = %record.title, ?status, "steam promotion no longer free; expired");
                    summary.expired += 1;
                }
                Err(err) => {
                    warn!(id = record.id, app_id, error = %err, "failed to mark steam promotion expired");
                    summary.errors += 1;
                }
            }
        }
        summary
    }

    /// On-demand check of a single stored Steam record.
    pub async fn verify_one(&self, id: i64) -> Result<VerificationOutcome, VerifyError> {
        let record: FreeGameRecord = repository::get(&self.db, id)
            .await?
            .ok_or(VerifyError::NotFound(id))?;
        let app_id = match (record.platform, record.app_id) {
            (Platform::Steam, Some(app_id)) => app_id,
            _ => return Err(VerifyError::NotSteam(id)),
        };

        let status = self
            .store
            .app_details(app_id)
            .await
            .map_err(|e| VerifyError::Store {
                app_id,
                message: e.to_string(),
            })?
            .as_ref()
            .and_then(classify_details)
            .ok_or_else(|| VerifyError::Store {
                app_id,
                message: "no data returned".to_string(),
            })?;

        debug!(id, app_id, ?status, "single steam verification");
        let expired = if status.is_free() {
            record.is_expired
        } else {
            repository::mark_expired(&self.db, id, Utc::now()).await?;
            true
        };
        Ok(VerificationOutcome {
            id,
            app_id,
            status,
            expired,
        })
    }
}
