// src/podcast_factory.rs
use crate::errors::FeedError;
use crate::podcast::{Episode, FeedUrl, Podcast};
use chrono::{DateTime, FixedOffset, Utc};
use log::debug;
use rss::{Channel, Item};

/// How many episodes of a feed to keep after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeLoadMode {
    All,
    Latest(usize),
}

pub struct PodcastFactory {
    load_mode: EpisodeLoadMode,
}

impl Default for PodcastFactory {
    fn default() -> Self {
        Self { load_mode: EpisodeLoadMode::All }
    }
}

impl PodcastFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_mode(mut self, load_mode: EpisodeLoadMode) -> Self {
        self.load_mode = load_mode;
        self
    }

    pub fn create_podcast(&self, channel: &Channel, feed_url: FeedUrl) -> Result<Podcast, FeedError> {
        let mut episodes: Vec<Episode> = channel
            .items()
            .iter()
            .filter_map(|item| {
                let audio_url = extract_audio_url(item)?;
                let title = item.title().unwrap_or("Unknown Episode").trim().to_string();
                let description = item
                    .description()
                    .or_else(|| item.itunes_ext().and_then(|it| it.summary()))
                    .map(|s| s.trim().to_string());
                let duration = item.itunes_ext().and_then(|it| it.duration().map(String::from));
                let published = item
                    .pub_date()
                    .and_then(parse_pub_date)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);

                Some(Episode::new(title, description, published, duration, audio_url))
            })
            .collect();

        if episodes.is_empty() {
            return Err(FeedError::NoEpisodes);
        }

        if let EpisodeLoadMode::Latest(count) = self.load_mode {
            debug!("PodcastFactory: keeping {} of {} episodes", count, episodes.len());
            episodes.truncate(count);
        }

        Ok(Podcast::new(
            feed_url,
            channel.title().trim().to_string(),
            Some(channel.description().to_string()).filter(|s| !s.is_empty()),
            episodes,
        ))
    }
}

/// Enclosure first; an item whose enclosure has a non-audio MIME type is
/// skipped unless its plain link points at an audio file.
fn extract_audio_url(item: &Item) -> Option<String> {
    if let Some(enclosure) = item.enclosure() {
        let mime = enclosure.mime_type();
        if mime.is_empty() || mime.to_lowercase().contains("audio") {
            return Some(enclosure.url().to_string());
        }
    }

    item.link().filter(|link| has_audio_extension(link)).map(String::from)
}

fn has_audio_extension(url: &str) -> bool {
    const AUDIO_EXTENSIONS: [&str; 5] = [".mp3", ".m4a", ".ogg", ".wav", ".aac"];
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn parse_pub_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt);
    }

    // Feeds in the wild carry dates that miss RFC 2822 by a hair
    const RELAXED_FORMATS: [&str; 3] =
        ["%a, %d %b %Y %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%d %H:%M:%S %z"];
    RELAXED_FORMATS.iter().find_map(|fmt| DateTime::parse_from_str(date_str, fmt).ok())
}
