use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rss::Channel;
use thiserror::Error;
use tracing::debug;

/// One RSS entry before classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("feed returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to parse RSS feed: {0}")]
    Parse(#[from] rss::Error),
}

/// Anything that can hand the pipeline a batch of feed items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<FeedItem>, FeedError>;
}

/// Fetches the configured free-games RSS feed over HTTP.
pub struct FeedFetcher {
    client: Client,
    url: String,
}

impl FeedFetcher {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch_items(&self) -> Result<Vec<FeedItem>, FeedError> {
        debug!(url = %self.url, "fetching free-games feed");
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/rss+xml, application/xml;q=0.9, */*;q=0.8")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let bytes = response.bytes().await?;
        let items = parse_feed(&bytes)?;
        debug!(items = items.len(), "parsed free-games feed");
        Ok(items)
    }
}

/// Parse an RSS 2.0 document into items, preserving feed order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>, FeedError> {
    let channel = Channel::read_from(bytes)?;
    Ok(channel.items().iter().map(feed_item_from).collect())
}

fn feed_item_from(item: &rss::Item) -> FeedItem {
    let description = item
        .description()
        .or_else(|| item.content())
        .unwrap_or_default()
        .to_string();
    let link = item
        .link()
        .map(str::to_string)
        .or_else(|| item.guid().map(|g| g.value().to_string()))
        .unwrap_or_default();
    let pub_date = item
        .pub_date()
        .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc));

    FeedItem {
        title: item.title().unwrap_or_default().trim().to_string(),
        description,
        link: link.trim().to_string(),
        pub_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Free games</title>
    <link>https://example.com</link>
    <description>giveaways</description>
    <item>
      <title>Cool Game free in the steam store</title>
      <link>https://example.com/posts/1</link>
      <description><![CDATA[Grab it at <a href="https://store.steampowered.com/app/123456/CoolGame">Steam</a>]]></description>
      <pubDate>Sat, 17 Oct 2026 18:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Other Game (Epic Games)</title>
      <guid>https://example.com/posts/2</guid>
      <description>Free until October 22 on store.epicgames.com</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_in_order() {
        let items = parse_feed(SAMPLE.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Cool Game free in the steam store");
        assert!(items[0]
            .description
            .contains("store.steampowered.com/app/123456"));
        assert_eq!(items[0].link, "https://example.com/posts/1");
        assert_eq!(
            items[0].pub_date.map(|d| d.to_rfc3339()),
            Some("2026-10-17T18:00:00+00:00".to_string())
        );
        assert_eq!(items[1].title, "Other Game (Epic Games)");
        assert_eq!(items[1].link, "https://example.com/posts/2");
        assert!(items[1].pub_date.is_none());
    }

    #[test]
    fn rejects_non_rss_documents() {
        let err = parse_feed(b"<html><body>nope</body></html>").unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }
}
