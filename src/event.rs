// src/event.rs
use crate::podcast::Podcast;

/// Messages delivered from background tasks to the UI task. All UI state
/// changes happen on the UI task, driven by these.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A feed was fetched and parsed successfully.
    PodcastReady { podcast: Podcast },
    /// A feed fetch failed; `message` is ready for the status line.
    FetchFailed { message: String },
    /// The in-flight fetch finished, successfully or not.
    FetchFinished,
    /// Periodic playback progress, in whole seconds.
    PlaybackProgress { position: u64, duration: u64 },
    /// The current track played to its end.
    TrackFinished,
    /// The media engine dropped its IPC connection.
    PlayerDied { message: String },
}
