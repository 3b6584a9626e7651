// src/podcast.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// === FEED URL ===
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedUrl(String);

impl fmt::Display for FeedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for FeedUrl {
    fn eq(&self, other: &Self) -> bool {
        // Feeds are the same regardless of a trailing slash
        self.0.trim_end_matches('/') == other.0.trim_end_matches('/')
    }
}

impl Eq for FeedUrl {}

impl FeedUrl {
    pub fn new(s: &str) -> Self {
        FeedUrl(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for FeedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// === EPISODE ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    title: String,
    description: Option<String>,
    published: DateTime<Utc>,
    duration: Option<String>,
    audio_url: String,
}

impl Episode {
    pub fn new(
        title: String,
        description: Option<String>,
        published: DateTime<Utc>,
        duration: Option<String>,
        audio_url: String,
    ) -> Self {
        Self { title, description, published, duration, audio_url }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn published(&self) -> DateTime<Utc> {
        self.published
    }

    /// Duration as the feed carried it, e.g. "1:02:45" or "45:10".
    pub fn duration(&self) -> Option<&str> {
        self.duration.as_deref()
    }

    pub fn audio_url(&self) -> &str {
        &self.audio_url
    }
}

// === PODCAST ===
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Podcast {
    url: FeedUrl,
    title: String,
    description: Option<String>,
    episodes: Vec<Episode>,
    last_updated: DateTime<Utc>,
}

impl Podcast {
    pub fn new(
        url: FeedUrl,
        title: String,
        description: Option<String>,
        episodes: Vec<Episode>,
    ) -> Self {
        Self { url, title, description, episodes, last_updated: Utc::now() }
    }

    pub fn url(&self) -> &FeedUrl {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

impl fmt::Display for Podcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title       : {}", self.title)?;
        writeln!(f, "Feed URL    : {}", self.url)?;
        if let Some(desc) = &self.description {
            writeln!(f, "Description : {}", desc)?;
        }
        writeln!(f, "Episodes    : {}", self.episodes.len())?;
        write!(f, "Last updated: {}", self.last_updated)
    }
}
