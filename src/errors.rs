// errors.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("RSS parsing error: {0}")]
    Rss(#[from] rss::Error),

    #[error("No playable episodes found in feed")]
    NoEpisodes,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Format(String),
}

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Failed to spawn media engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Media engine IPC socket did not appear")]
    SocketTimeout,

    #[error("Media engine IPC error: {0}")]
    Ipc(String),

    #[error("Media engine request timed out")]
    RequestTimeout,

    #[error("Media engine connection closed")]
    ConnectionClosed,

    #[error("Unsupported playback speed: {0}")]
    UnsupportedSpeed(f64),
}
