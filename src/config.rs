// Process configuration assembled from the environment (.env supported)

use crate::scheduler::SchedulerConfig;
use crate::util::env::{self as env_util, parse_flag};
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/steam_sentinel.db";
pub const DEFAULT_FEED_URL: &str = "https://www.gamerpower.com/rss/giveaways";
pub const DEFAULT_STEAM_STORE_URL: &str = "https://store.steampowered.com";
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Keys echoed (redacted) in the startup configuration snapshot.
const SNAPSHOT_KEYS: &[&str] = &[
    "DATABASE_URL",
    "API_HOST",
    "API_PORT",
    "API_SECRET",
    "FREE_GAMES_FEED_URL",
    "FREE_GAMES_CHECK_INTERVAL_SECS",
    "VERIFY_ON_STARTUP",
    "VERIFY_STARTUP_DELAY_SECS",
    "VERIFY_REQUEST_DELAY_MS",
    "STEAM_STORE_BASE_URL",
    "DISCORD_WEBHOOK_URL",
];

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub api_host: String,
    pub api_port: u16,
    pub api_secret: Option<String>,
    pub allowed_origins: String,
    pub feed_url: String,
    pub check_interval: Duration,
    pub verify_on_startup: bool,
    pub verify_startup_delay: Duration,
    pub verify_request_delay: Duration,
    pub steam_store_base_url: String,
    pub steam_country: String,
    pub discord_webhook_url: Option<String>,
    pub discord_username: String,
    pub http_timeout: Duration,
    pub retention_days: i64,
}

impl SentinelConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        env_util::init_env();
        Self::from_lookup(env_util::env_opt)
    }

    /// Build configuration from an arbitrary key lookup (empty values count as unset).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let feed_url = get("FREE_GAMES_FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
        url::Url::parse(&feed_url).context("Invalid FREE_GAMES_FEED_URL")?;

        let steam_store_base_url = get("STEAM_STORE_BASE_URL")
            .unwrap_or_else(|| DEFAULT_STEAM_STORE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&steam_store_base_url).context("Invalid STEAM_STORE_BASE_URL")?;

        let discord_webhook_url = get("DISCORD_WEBHOOK_URL");
        if let Some(webhook) = &discord_webhook_url {
            url::Url::parse(webhook).context("Invalid DISCORD_WEBHOOK_URL")?;
        }

        let check_interval_secs: u64 = parse_or(&get, "FREE_GAMES_CHECK_INTERVAL_SECS", 3600)?;
        if check_interval_secs == 0 {
            anyhow::bail!("FREE_GAMES_CHECK_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            db_max_connections: parse_or(&get, "DB_MAX_CONNS", 5)?,
            api_host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_or(&get, "API_PORT", 8080)?,
            api_secret: get("API_SECRET"),
            allowed_origins: get("ALLOWED_ORIGINS")
                .unwrap_or_else(|| "http://localhost:3000,http://localhost:8080".to_string()),
            feed_url,
            check_interval: Duration::from_secs(check_interval_secs),
            verify_on_startup: match get("VERIFY_ON_STARTUP") {
                Some(raw) => parse_flag(&raw).context("Invalid VERIFY_ON_STARTUP")?,
                None => true,
            },
            verify_startup_delay: Duration::from_secs(parse_or(
                &get,
                "VERIFY_STARTUP_DELAY_SECS",
                30,
            )?),
            verify_request_delay: Duration::from_millis(parse_or(
                &get,
                "VERIFY_REQUEST_DELAY_MS",
                1000,
            )?),
            steam_store_base_url,
            steam_country: get("STEAM_COUNTRY")
                .unwrap_or_else(|| "us".to_string())
                .to_ascii_lowercase(),
            discord_webhook_url,
            discord_username: get("DISCORD_USERNAME")
                .unwrap_or_else(|| "SteamSentinel".to_string()),
            http_timeout: Duration::from_secs(parse_or(&get, "HTTP_TIMEOUT_SECS", 15)?),
            retention_days: parse_or(&get, "FREE_GAMES_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            check_interval: self.check_interval,
            verify_delay: self.verify_on_startup.then_some(self.verify_startup_delay),
        }
    }

    /// Log a redacted snapshot of the effective environment.
    pub fn log_snapshot(&self) {
        let _ = env_util::preflight_check("steam-sentinel", &[], SNAPSHOT_KEYS);
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {key}: {e}")),
        None => Ok(default),
    }
}
