// src/podcast_fetch.rs
use crate::errors::{FeedError, FetchError};
use crate::podcast::{FeedUrl, Podcast};
use crate::podcast_factory::{EpisodeLoadMode, PodcastFactory};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use rss::Channel;
use std::time::Duration;
use url::Url;

const APP_USER_AGENT: &str = concat!("rustcast/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Reject anything that is not an absolute http(s) URL with a host.
pub fn validate_feed_url(url: &str) -> Result<(), FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    let scheme_ok = parsed.scheme() == "http" || parsed.scheme() == "https";
    if !scheme_ok || parsed.host_str().is_none() {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

// ===== Fetcher trait
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

// ===== Live http fetcher
pub struct HttpFeedFetcher {
    client: Client,
    max_retries: u32,
}

impl HttpFeedFetcher {
    pub fn new() -> Self {
        let client: Client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("Failed to create request client.");

        Self { client, max_retries: DEFAULT_MAX_RETRIES }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }
        Ok(response.text().await?)
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        info!("HttpFeedFetcher: fetching {}", url);
        // Exponential backoff, capped at 60s between attempts
        for attempt in 0..self.max_retries {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!("HttpFeedFetcher: fetched {} bytes", body.len());
                    return Ok(body);
                }
                Err(e) => {
                    let delay = Duration::from_secs(2u64.pow(attempt).min(60));
                    warn!(
                        "HttpFeedFetcher: attempt {} failed, retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        self.fetch_once(url).await
    }
}

// ===== Fake fetcher for testing
pub struct FakeFetcher {
    pub response: String,
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        Ok(self.response.clone())
    }
}

/// Fetch a feed and map it into the podcast model.
pub async fn fetch_podcast(
    url: &FeedUrl,
    fetcher: &(dyn FeedFetcher + Send + Sync),
    load_mode: EpisodeLoadMode,
) -> Result<Podcast, FeedError> {
    validate_feed_url(url.as_str()).map_err(FeedError::Fetch)?;

    let content: String = fetcher.fetch(url.as_str()).await.map_err(FeedError::Fetch)?;
    let channel: Channel = Channel::read_from(content.as_bytes())?;

    PodcastFactory::new().with_load_mode(load_mode).create_podcast(&channel, url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMMY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0">
            <channel>
                <title>Test Podcast</title>
                <link>http://example.com</link>
                <description>Test Description</description>
                <item>
                    <title>Episode 1</title>
                    <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
                    <enclosure url="http://example.com/ep1.mp3" length="1024" type="audio/mpeg"/>
                </item>
            </channel>
        </rss>"#;

    #[test]
    fn validate_accepts_http_and_https() {
        assert!(validate_feed_url("http://example.com/feed").is_ok());
        assert!(validate_feed_url("https://example.com/feed.rss").is_ok());
    }

    #[test]
    fn validate_rejects_other_schemes_and_garbage() {
        assert!(matches!(validate_feed_url("ftp://example.com/feed"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(validate_feed_url("not a url"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(validate_feed_url(""), Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn fetch_podcast_parses_fake_feed() {
        let fetcher = FakeFetcher { response: DUMMY_FEED.to_string() };
        let url = FeedUrl::new("http://example.com/feed");

        let podcast = fetch_podcast(&url, &fetcher, EpisodeLoadMode::All).await.unwrap();

        assert_eq!(podcast.title(), "Test Podcast");
        assert_eq!(podcast.url(), &url);
        assert_eq!(podcast.description(), Some("Test Description"));
        assert_eq!(podcast.episodes().len(), 1);
        assert_eq!(podcast.episodes()[0].audio_url(), "http://example.com/ep1.mp3");
    }

    // SAD PATHS

    #[tokio::test]
    async fn fetch_podcast_rejects_invalid_url() {
        let fetcher = FakeFetcher { response: DUMMY_FEED.to_string() };
        let result = fetch_podcast(&FeedUrl::new("nonsense"), &fetcher, EpisodeLoadMode::All).await;
        assert!(matches!(result, Err(FeedError::Fetch(FetchError::InvalidUrl(_)))));
    }

    #[tokio::test]
    async fn fetch_podcast_reports_malformed_feed() {
        let fetcher =
            FakeFetcher { response: r#"<?xml version="1.0"?><rss><channel>"#.to_string() };
        let result =
            fetch_podcast(&FeedUrl::new("http://example.com"), &fetcher, EpisodeLoadMode::All)
                .await;
        assert!(matches!(result, Err(FeedError::Rss(_))));
    }
}
