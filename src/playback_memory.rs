// src/playback_memory.rs
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const MIN_RESUME_POSITION_SECS: f64 = 30.0;
const MAX_RESUME_AGE_DAYS: i64 = 30;
const COMPLETION_THRESHOLD: f64 = 0.95;
const MIN_SAVE_PROGRESS_SECS: f64 = 5.0;
const AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_MAX_POSITIONS: usize = 1000;

/// A saved playback position for one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackPosition {
    pub episode_url: String,
    pub episode_title: String,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub last_played: DateTime<Utc>,
    #[serde(default = "one")]
    pub play_count: u32,
    #[serde(default)]
    pub completion_percentage: f64,
}

fn one() -> u32 {
    1
}

impl PlaybackPosition {
    pub fn is_completed(&self) -> bool {
        self.completion_percentage >= COMPLETION_THRESHOLD
    }

    /// Resume only makes sense for episodes with real progress that are
    /// neither finished nor stale.
    pub fn should_resume(&self) -> bool {
        if self.position_seconds < MIN_RESUME_POSITION_SECS {
            return false;
        }
        if self.is_completed() {
            return false;
        }
        let age = Utc::now().signed_duration_since(self.last_played);
        age.num_days() <= MAX_RESUME_AGE_DAYS
    }

    pub fn resume_time_formatted(&self) -> String {
        crate::progress::format_time(self.position_seconds as u64)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaybackStats {
    pub total_episodes: usize,
    pub completed_episodes: usize,
    pub in_progress_episodes: usize,
    pub total_listening_hours: f64,
    pub total_play_count: u32,
    pub most_played: Option<(String, u32)>,
}

/// Playback positions across sessions, keyed by episode URL.
pub struct PlaybackMemory {
    path: PathBuf,
    positions: HashMap<String, PlaybackPosition>,
    max_positions: usize,
    last_save: Option<Instant>,
}

impl PlaybackMemory {
    pub fn new(path: PathBuf) -> Self {
        let mut memory =
            Self { path, positions: HashMap::new(), max_positions: DEFAULT_MAX_POSITIONS, last_save: None };
        if let Err(e) = memory.load() {
            warn!("PlaybackMemory: starting empty, load failed: {}", e);
        }
        memory
    }

    #[cfg(test)]
    fn with_max_positions(mut self, max_positions: usize) -> Self {
        self.max_positions = max_positions;
        self
    }

    fn load(&mut self) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Read { path: self.path.clone(), source: e })?;
        self.positions = serde_json::from_str(&content)
            .map_err(|e| StoreError::Json { path: self.path.clone(), source: e })?;
        info!("PlaybackMemory: loaded {} positions", self.positions.len());
        Ok(())
    }

    /// Persist positions. Unforced saves are rate-limited so frequent
    /// progress updates do not hammer the disk. The file is written to a
    /// temp path and renamed into place.
    pub fn save(&mut self, force: bool) -> Result<(), StoreError> {
        if !force && self.last_save.is_some_and(|t| t.elapsed() < AUTO_SAVE_INTERVAL) {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Write { path: self.path.clone(), source: e })?;
        }
        let content = serde_json::to_string_pretty(&self.positions)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content)
            .map_err(|e| StoreError::Write { path: tmp_path.clone(), source: e })?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| StoreError::Write { path: self.path.clone(), source: e })?;

        self.last_save = Some(Instant::now());
        debug!("PlaybackMemory: saved {} positions", self.positions.len());
        Ok(())
    }

    /// Record progress for an episode. Progress under five seconds is
    /// ignored.
    pub fn update_position(
        &mut self,
        episode_url: &str,
        episode_title: &str,
        position_seconds: f64,
        duration_seconds: f64,
    ) {
        if position_seconds < MIN_SAVE_PROGRESS_SECS {
            return;
        }

        let completion_percentage =
            if duration_seconds > 0.0 { position_seconds / duration_seconds } else { 0.0 };

        self.positions
            .entry(episode_url.to_string())
            .and_modify(|existing| {
                existing.position_seconds = position_seconds;
                existing.duration_seconds = duration_seconds;
                existing.completion_percentage = completion_percentage;
                existing.last_played = Utc::now();
            })
            .or_insert_with(|| PlaybackPosition {
                episode_url: episode_url.to_string(),
                episode_title: episode_title.to_string(),
                position_seconds,
                duration_seconds,
                last_played: Utc::now(),
                play_count: 1,
                completion_percentage,
            });

        self.evict_oldest();

        if let Err(e) = self.save(false) {
            warn!("PlaybackMemory: autosave failed: {}", e);
        }
    }

    /// Note that an episode started playing (bumps its play count).
    pub fn start_episode(&mut self, episode_url: &str) {
        if let Some(position) = self.positions.get_mut(episode_url) {
            position.play_count += 1;
        }
    }

    /// The saved position for an episode, when it qualifies for resume.
    pub fn resume_position(&self, episode_url: &str) -> Option<&PlaybackPosition> {
        self.positions.get(episode_url).filter(|p| p.should_resume())
    }

    pub fn mark_completed(&mut self, episode_url: &str) {
        if let Some(position) = self.positions.get_mut(episode_url) {
            position.completion_percentage = 1.0;
            position.last_played = Utc::now();
            if let Err(e) = self.save(true) {
                warn!("PlaybackMemory: save failed: {}", e);
            }
        }
    }

    pub fn remove(&mut self, episode_url: &str) -> bool {
        if self.positions.remove(episode_url).is_some() {
            if let Err(e) = self.save(true) {
                warn!("PlaybackMemory: save failed: {}", e);
            }
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn recently_played(&self, limit: usize) -> Vec<&PlaybackPosition> {
        let mut positions: Vec<&PlaybackPosition> = self.positions.values().collect();
        positions.sort_by(|a, b| b.last_played.cmp(&a.last_played));
        positions.truncate(limit);
        positions
    }

    pub fn in_progress(&self) -> Vec<&PlaybackPosition> {
        let mut positions: Vec<&PlaybackPosition> =
            self.positions.values().filter(|p| p.should_resume()).collect();
        positions.sort_by(|a, b| b.last_played.cmp(&a.last_played));
        positions
    }

    pub fn statistics(&self) -> PlaybackStats {
        let most_played = self
            .positions
            .values()
            .max_by_key(|p| p.play_count)
            .map(|p| (p.episode_title.clone(), p.play_count));

        PlaybackStats {
            total_episodes: self.positions.len(),
            completed_episodes: self.positions.values().filter(|p| p.is_completed()).count(),
            in_progress_episodes: self.positions.values().filter(|p| p.should_resume()).count(),
            total_listening_hours: self.positions.values().map(|p| p.position_seconds).sum::<f64>()
                / 3600.0,
            total_play_count: self.positions.values().map(|p| p.play_count).sum(),
            most_played,
        }
    }

    fn evict_oldest(&mut self) {
        if self.positions.len() <= self.max_positions {
            return;
        }
        let mut entries: Vec<(String, DateTime<Utc>)> =
            self.positions.iter().map(|(url, p)| (url.clone(), p.last_played)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        for (url, _) in entries.into_iter().skip(self.max_positions) {
            self.positions.remove(&url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    fn memory(dir: &tempfile::TempDir) -> PlaybackMemory {
        PlaybackMemory::new(dir.path().join("positions.json"))
    }

    #[test]
    fn update_and_resume_roundtrip() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir);
        memory.update_position("http://e/1.mp3", "Ep 1", 120.0, 600.0);
        memory.save(true).unwrap();

        let reloaded = PlaybackMemory::new(dir.path().join("positions.json"));
        let position = reloaded.resume_position("http://e/1.mp3").unwrap();
        assert_eq!(position.episode_title, "Ep 1");
        assert_eq!(position.position_seconds, 120.0);
        assert_eq!(position.resume_time_formatted(), "02:00");
    }

    #[test]
    fn tiny_progress_is_not_recorded() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir);
        memory.update_position("http://e/1.mp3", "Ep 1", 3.0, 600.0);
        assert!(memory.is_empty());
    }

    #[test]
    fn no_resume_below_thirty_seconds() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir);
        memory.update_position("http://e/1.mp3", "Ep 1", 10.0, 600.0);
        assert!(memory.resume_position("http://e/1.mp3").is_none());
    }

    #[test]
    fn no_resume_when_nearly_finished() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir);
        memory.update_position("http://e/1.mp3", "Ep 1", 580.0, 600.0);
        assert!(memory.resume_position("http://e/1.mp3").is_none());
    }

    #[test]
    fn no_resume_for_stale_positions() {
        let position = PlaybackPosition {
            episode_url: "http://e/1.mp3".into(),
            episode_title: "Ep 1".into(),
            position_seconds: 120.0,
            duration_seconds: 600.0,
            last_played: Utc::now() - ChronoDuration::days(40),
            play_count: 1,
            completion_percentage: 0.2,
        };
        assert!(!position.should_resume());
    }

    #[test]
    fn mark_completed_disables_resume() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir);
        memory.update_position("http://e/1.mp3", "Ep 1", 120.0, 600.0);
        memory.mark_completed("http://e/1.mp3");
        assert!(memory.resume_position("http://e/1.mp3").is_none());
    }

    #[test]
    fn eviction_keeps_most_recent_positions() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir).with_max_positions(2);
        memory.update_position("http://e/1.mp3", "Ep 1", 60.0, 600.0);
        memory.update_position("http://e/2.mp3", "Ep 2", 60.0, 600.0);
        memory.update_position("http://e/3.mp3", "Ep 3", 60.0, 600.0);

        assert_eq!(memory.len(), 2);
        assert!(memory.resume_position("http://e/3.mp3").is_some());
    }

    #[test]
    fn remove_forgets_a_position() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir);
        memory.update_position("http://e/1.mp3", "Ep 1", 120.0, 600.0);

        assert!(memory.remove("http://e/1.mp3"));
        assert!(!memory.remove("http://e/1.mp3"));
        assert!(memory.resume_position("http://e/1.mp3").is_none());
    }

    #[test]
    fn in_progress_lists_resumable_episodes_most_recent_first() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir);
        memory.update_position("http://e/1.mp3", "Ep 1", 120.0, 600.0);
        memory.update_position("http://e/2.mp3", "Ep 2", 595.0, 600.0); // effectively done
        memory.update_position("http://e/3.mp3", "Ep 3", 60.0, 600.0);

        let in_progress = memory.in_progress();
        let titles: Vec<&str> = in_progress.iter().map(|p| p.episode_title.as_str()).collect();
        assert_eq!(titles, vec!["Ep 3", "Ep 1"]);
    }

    #[test]
    fn statistics_summarize_positions() {
        let dir = tempdir().unwrap();
        let mut memory = memory(&dir);
        memory.update_position("http://e/1.mp3", "Ep 1", 3600.0, 7200.0);
        memory.update_position("http://e/2.mp3", "Ep 2", 595.0, 600.0);
        memory.start_episode("http://e/1.mp3");

        let stats = memory.statistics();
        assert_eq!(stats.total_episodes, 2);
        assert_eq!(stats.completed_episodes, 1);
        assert_eq!(stats.in_progress_episodes, 1);
        assert_eq!(stats.most_played, Some(("Ep 1".into(), 2)));
        assert!((stats.total_listening_hours - (3600.0 + 595.0) / 3600.0).abs() < 1e-9);
    }
}
