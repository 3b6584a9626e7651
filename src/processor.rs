// src/processor.rs
use crate::event::AppEvent;
use crate::podcast::FeedUrl;
use crate::podcast_factory::EpisodeLoadMode;
use crate::podcast_fetch::{FeedFetcher, fetch_podcast};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// Runs feed fetches off the UI task and reports back over the event
/// channel: `PodcastReady` on success, `FetchFailed` on error, and
/// `FetchFinished` in either case.
///
/// The busy flag guards against overlapping fetches: while one is in
/// flight, `spawn_fetch` refuses to start another. `cancel` does not abort
/// the HTTP request; it bumps the generation counter so the in-flight
/// result is dropped instead of delivered.
pub struct FeedProcessor {
    fetcher: Arc<dyn FeedFetcher + Send + Sync>,
    load_mode: EpisodeLoadMode,
    busy: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl FeedProcessor {
    pub fn new(fetcher: Arc<dyn FeedFetcher + Send + Sync>, load_mode: EpisodeLoadMode) -> Self {
        Self {
            fetcher,
            load_mode,
            busy: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Drop the result of the in-flight fetch, if any.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Start fetching `url` in the background. Returns false without doing
    /// anything when a fetch is already in flight.
    pub fn spawn_fetch(&self, url: FeedUrl, events: UnboundedSender<AppEvent>) -> bool {
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("FeedProcessor: fetch of {} refused, already busy", url);
            return false;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let fetcher = self.fetcher.clone();
        let load_mode = self.load_mode;
        let busy = self.busy.clone();
        let current_generation = self.generation.clone();

        info!("FeedProcessor: fetching {}", url);
        tokio::spawn(async move {
            let result = fetch_podcast(&url, fetcher.as_ref(), load_mode).await;

            if current_generation.load(Ordering::SeqCst) == generation {
                match result {
                    Ok(podcast) => {
                        info!(
                            "FeedProcessor: fetched '{}' ({} episodes)",
                            podcast.title(),
                            podcast.episodes().len()
                        );
                        let _ = events.send(AppEvent::PodcastReady { podcast });
                    }
                    Err(e) => {
                        warn!("FeedProcessor: fetch of {} failed: {}", url, e);
                        let _ = events.send(AppEvent::FetchFailed { message: e.to_string() });
                    }
                }
            } else {
                debug!("FeedProcessor: result for {} dropped, fetch was cancelled", url);
            }

            busy.store(false, Ordering::SeqCst);
            let _ = events.send(AppEvent::FetchFinished);
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio::sync::mpsc::unbounded_channel;

    const DUMMY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0">
            <channel>
                <title>Gated Podcast</title>
                <link>http://example.com</link>
                <description>Waits until released</description>
                <item>
                    <title>Episode 1</title>
                    <enclosure url="http://example.com/ep1.mp3" length="1" type="audio/mpeg"/>
                </item>
            </channel>
        </rss>"#;

    /// Blocks in `fetch` until released, so tests control when the fetch
    /// completes.
    struct GatedFetcher {
        gate: Arc<Notify>,
        response: String,
    }

    #[async_trait]
    impl FeedFetcher for GatedFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            self.gate.notified().await;
            Ok(self.response.clone())
        }
    }

    fn gated_processor() -> (FeedProcessor, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let fetcher = GatedFetcher { gate: gate.clone(), response: DUMMY_FEED.to_string() };
        (FeedProcessor::new(Arc::new(fetcher), EpisodeLoadMode::All), gate)
    }

    #[tokio::test]
    async fn fetch_delivers_ready_then_finished() {
        let (processor, gate) = gated_processor();
        let (tx, mut rx) = unbounded_channel();

        assert!(processor.spawn_fetch(FeedUrl::new("http://example.com/feed"), tx));
        assert!(processor.is_busy());
        gate.notify_one();

        match rx.recv().await.unwrap() {
            AppEvent::PodcastReady { podcast } => assert_eq!(podcast.title(), "Gated Podcast"),
            other => panic!("expected PodcastReady, got {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), AppEvent::FetchFinished));
        assert!(!processor.is_busy());
    }

    #[tokio::test]
    async fn second_fetch_is_refused_while_busy() {
        let (processor, gate) = gated_processor();
        let (tx, mut rx) = unbounded_channel();

        assert!(processor.spawn_fetch(FeedUrl::new("http://example.com/a"), tx.clone()));
        assert!(!processor.spawn_fetch(FeedUrl::new("http://example.com/b"), tx));

        gate.notify_one();
        assert!(matches!(rx.recv().await.unwrap(), AppEvent::PodcastReady { .. }));
        assert!(matches!(rx.recv().await.unwrap(), AppEvent::FetchFinished));
        // Only the first fetch ran
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancelled_fetch_result_is_dropped() {
        let (processor, gate) = gated_processor();
        let (tx, mut rx) = unbounded_channel();

        assert!(processor.spawn_fetch(FeedUrl::new("http://example.com/feed"), tx));
        processor.cancel();
        gate.notify_one();

        // The completion event still arrives, the stale result does not.
        assert!(matches!(rx.recv().await.unwrap(), AppEvent::FetchFinished));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let fetcher = crate::podcast_fetch::FakeFetcher { response: "not xml".to_string() };
        let processor = FeedProcessor::new(Arc::new(fetcher), EpisodeLoadMode::All);
        let (tx, mut rx) = unbounded_channel();

        assert!(processor.spawn_fetch(FeedUrl::new("http://example.com/feed"), tx));

        assert!(matches!(rx.recv().await.unwrap(), AppEvent::FetchFailed { .. }));
        assert!(matches!(rx.recv().await.unwrap(), AppEvent::FetchFinished));
    }
}
