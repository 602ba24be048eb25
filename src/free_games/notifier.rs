//! Outbound notification for newly discovered promotions.
//!
//! The Discord sink honours 429 responses by waiting for `Retry-After`
//! (falling back to `X-RateLimit-Reset-After`) before trying again.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::models::{FreeGameRecord, Platform};

const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Sink for "new free game" announcements.
#[async_trait]
pub trait GameNotifier: Send + Sync {
    /// False when nothing is configured; callers skip dispatch silently.
    fn is_enabled(&self) -> bool;

    async fn notify_new_game(&self, game: &FreeGameRecord) -> Result<()>;
}

/// Discord webhook notifier. Disabled when no webhook URL is configured.
pub struct DiscordNotifier {
    client: Client,
    webhook_url: Option<String>,
    username: String,
}

impl DiscordNotifier {
    pub fn new(client: Client, webhook_url: Option<String>, username: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
            username: username.into(),
        }
    }

    fn color(platform: Platform) -> u32 {
        match platform {
            Platform::Epic => 0x2a2a2a,
            Platform::Steam => 0x1b2838,
        }
    }

    /// Webhook body for one record: a single embed linking to the store page.
    pub fn build_payload(&self, game: &FreeGameRecord) -> Value {
        let store = match game.platform {
            Platform::Epic => "Epic Games Store",
            Platform::Steam => "Steam",
        };
        let mut fields = vec![json!({ "name": "Platform", "value": store, "inline": true })];
        if let Some(end) = game.end_date {
            fields.push(json!({
                "name": "Free until",
                "value": end.format("%B %-d, %Y").to_string(),
                "inline": true
            }));
        }
        if let Some(app_id) = game.app_id {
            fields.push(json!({ "name": "App ID", "value": app_id.to_string(), "inline": true }));
        }

        let description = game
            .description
            .clone()
            .unwrap_or_else(|| format!("Free to keep on {store}."));

        json!({
            "username": self.username,
            "embeds": [{
                "title": format!("Free game: {}", game.title),
                "description": description,
                "url": game.url,
                "color": Self::color(game.platform),
                "fields": fields,
                "timestamp": game.discovered_at.to_rfc3339(),
                "footer": { "text": format!("Discovered via {store} promotion feed") }
            }]
        })
    }

    async fn send_with_retry(&self, url: &str, payload: &Value) -> Result<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let response = self
                .client
                .post(url)
                .json(payload)
                .send()
                .await
                .context("discord webhook request failed")?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 {
                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    bail!("discord rate limit exceeded after {MAX_RATE_LIMIT_RETRIES} attempts");
                }
                let wait = retry_after(&response).unwrap_or(Duration::from_secs(1));
                debug!(?wait, attempts, "discord rate limited; waiting before retry");
                tokio::time::sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            bail!("discord webhook returned {status}: {body}");
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .filter_map(|name| response.headers().get(*name))
        .filter_map(|v| v.to_str().ok()?.trim().parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl GameNotifier for DiscordNotifier {
    fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn notify_new_game(&self, game: &FreeGameRecord) -> Result<()> {
        let Some(url) = self.webhook_url.as_deref() else {
            return Ok(());
        };
        let payload = self.build_payload(game);
        self.send_with_retry(url, &payload).await?;
        debug!(id = game.id, title = %game.title, "discord notification sent");
        Ok(())
    }
}
