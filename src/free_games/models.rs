use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storefront a promotion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Platform {
    Epic,
    Steam,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Epic => "epic",
            Platform::Steam => "steam",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform '{0}' (expected epic or steam)")]
pub struct ParsePlatformError(pub String);

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epic" | "egs" => Ok(Platform::Epic),
            "steam" => Ok(Platform::Steam),
            other => Err(ParsePlatformError(other.to_string())),
        }
    }
}

/// One persisted promotional listing (`free_games` row).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FreeGameRecord {
    pub id: i64,
    pub platform: Platform,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub app_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload produced by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFreeGame {
    pub platform: Platform,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub app_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl NewFreeGame {
    /// True when the promotion already ended at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end < now)
    }
}

#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(FreeGameRecord),
    Duplicate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FreeGameStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
    pub claimed: i64,
    pub epic: i64,
    pub steam: i64,
    pub claimed_last_30_days: i64,
}

/// Listing query for `repository::list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FreeGameFilter {
    pub platform: Option<Platform>,
    #[serde(default)]
    pub include_expired: bool,
    pub claimed: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Result of one feed pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckSummary {
    pub fetched: usize,
    pub epic_new: usize,
    pub steam_new: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub expired_on_insert: usize,
    pub expired_by_date: u64,
    pub notified: usize,
    pub notify_failures: usize,
    pub store_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckSummary {
    pub fn new_total(&self) -> usize {
        self.epic_new + self.steam_new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_str() {
        assert_eq!("Epic".parse::<Platform>(), Ok(Platform::Epic));
        assert_eq!(" steam ".parse::<Platform>(), Ok(Platform::Steam));
        assert_eq!(Platform::Steam.to_string(), "steam");
        assert!("gog".parse::<Platform>().is_err());
    }

    #[test]
    fn expiry_is_relative_to_now() {
        let now = Utc::now();
        let mut game = NewFreeGame {
            platform: Platform::Epic,
            title: "Cool Game".into(),
            description: None,
            url: "https://store.epicgames.com/p/cool-game".into(),
            app_id: None,
            start_date: now,
            end_date: None,
        };
        assert!(!game.is_expired_at(now));
        game.end_date = Some(now - chrono::Duration::hours(1));
        assert!(game.is_expired_at(now));
        game.end_date = Some(now + chrono::Duration::hours(1));
        assert!(!game.is_expired_at(now));
    }
}
