use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::feed::{FeedError, FeedItem, FeedSource};
use super::models::FreeGameRecord;
use super::notifier::GameNotifier;
use super::verifier::{AppData, AppDetails, PriceOverview, ReleaseDate, StoreDetails};

/// Feed returning a fixed batch, or a status error when `fail` is set.
#[derive(Default)]
pub struct FakeFeed {
    pub items: Vec<FeedItem>,
    pub fail: bool,
}

impl FakeFeed {
    pub fn with_items(items: Vec<FeedItem>) -> Self {
        Self { items, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            items: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    async fn fetch_items(&self) -> Result<Vec<FeedItem>, FeedError> {
        if self.fail {
            return Err(FeedError::Status {
                status: 503,
                url: "http://feed.test/rss".into(),
            });
        }
        Ok(self.items.clone())
    }
}

/// Records the titles it was asked to announce.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl GameNotifier for RecordingNotifier {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn notify_new_game(&self, game: &FreeGameRecord) -> Result<()> {
        self.sent.lock().unwrap().push(game.title.clone());
        if self.fail {
            return Err(anyhow!("webhook down"));
        }
        Ok(())
    }
}

/// Canned `appdetails` answers keyed by app id; remembers when it was called.
#[derive(Default)]
pub struct FakeStore {
    answers: HashMap<i64, AppDetails>,
    failing: HashSet<i64>,
    calls: Mutex<Vec<Instant>>,
}

impl FakeStore {
    /// Call times relative to `origin`, in call order.
    pub fn call_offsets(&self, origin: Instant) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(origin))
            .collect()
    }

    pub fn with(mut self, app_id: i64, details: AppDetails) -> Self {
        self.answers.insert(app_id, details);
        self
    }

    pub fn failing(mut self, app_id: i64) -> Self {
        self.failing.insert(app_id);
        self
    }

    fn listed(is_free: bool, final_price: i64, coming_soon: bool) -> AppDetails {
        AppDetails {
            success: true,
            data: Some(AppData {
                is_free: Some(is_free),
                price_overview: Some(PriceOverview {
                    final_price: Some(final_price),
                }),
                release_date: Some(ReleaseDate { coming_soon }),
            }),
        }
    }

    pub fn free() -> AppDetails {
        Self::listed(false, 0, false)
    }

    pub fn paid() -> AppDetails {
        Self::listed(false, 1999, false)
    }

    pub fn unreleased() -> AppDetails {
        Self::listed(false, 1999, true)
    }

    pub fn removed() -> AppDetails {
        AppDetails {
            success: false,
            data: None,
        }
    }
}

#[async_trait]
impl StoreDetails for FakeStore {
    async fn app_details(&self, app_id: i64) -> Result<Option<AppDetails>> {
        self.calls.lock().unwrap().push(Instant::now());
        if self.failing.contains(&app_id) {
            return Err(anyhow!("connection reset"));
        }
        Ok(self.answers.get(&app_id).cloned())
    }
}
