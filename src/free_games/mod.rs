//! Free-game promotion discovery and verification.

pub mod classifier;
pub mod end_date;
pub mod feed;
pub mod models;
pub mod notifier;
pub mod repository;
pub mod service;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use feed::{FeedError, FeedFetcher, FeedItem, FeedSource};
pub use models::{
    CheckSummary, FreeGameFilter, FreeGameRecord, FreeGameStats, InsertOutcome, NewFreeGame,
    Platform,
};
pub use notifier::{DiscordNotifier, GameNotifier};
pub use service::FreeGameService;
pub use verifier::{
    StoreDetails, SteamStoreClient, SweepSummary, VerificationOutcome, VerificationStatus,
    Verifier, VerifyError,
};
