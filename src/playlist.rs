// src/playlist.rs
use crate::errors::StoreError;
use crate::podcast::Episode;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const HISTORY_LIMIT: usize = 10;

/// A playable entry, detached from whatever feed it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub url: String,
    /// Duration in seconds; 0 when the feed carried none we could read.
    #[serde(default)]
    pub duration: u64,
}

impl From<&Episode> for Track {
    fn from(episode: &Episode) -> Self {
        Track {
            title: episode.title().to_string(),
            url: episode.audio_url().to_string(),
            duration: episode.duration().map(parse_duration).unwrap_or(0),
        }
    }
}

/// Parse "HH:MM:SS", "MM:SS" or plain seconds into seconds. Anything
/// unreadable is 0.
pub fn parse_duration(s: &str) -> u64 {
    let parts: Vec<&str> = s.trim().split(':').collect();
    let numbers: Option<Vec<u64>> = parts.iter().map(|p| p.parse::<u64>().ok()).collect();
    match numbers.as_deref() {
        Some([h, m, s]) => h * 3600 + m * 60 + s,
        Some([m, s]) => m * 60 + s,
        Some([s]) => *s,
        _ => 0,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlaylistFile {
    tracks: Vec<Track>,
    #[serde(default)]
    current_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub current_index: usize,
    pub timestamp: DateTime<Utc>,
}

/// The current playlist plus a bounded history of earlier ones.
pub struct PlaylistManager {
    playlist_path: PathBuf,
    history_path: PathBuf,
    tracks: Vec<Track>,
    current_index: usize,
    history: Vec<HistoryEntry>,
}

impl PlaylistManager {
    pub fn new(playlist_path: PathBuf, history_path: PathBuf) -> Self {
        Self { playlist_path, history_path, tracks: Vec::new(), current_index: 0, history: Vec::new() }
    }

    // === track operations ===

    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    pub fn add_episode(&mut self, episode: &Episode) -> usize {
        self.add_track(Track::from(episode))
    }

    pub fn remove_track(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.tracks.remove(index);
        if index <= self.current_index {
            self.current_index = self.current_index.saturating_sub(1);
        }
        true
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = 0;
    }

    /// Replace the playlist with one track per episode.
    pub fn populate_from_episodes(&mut self, episodes: &[Episode]) {
        self.clear();
        for episode in episodes {
            self.add_episode(episode);
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn set_current_index(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.current_index = index;
            return true;
        }
        false
    }

    pub fn next_track(&mut self) -> Option<&Track> {
        if self.current_index + 1 < self.tracks.len() {
            self.current_index += 1;
            self.current_track()
        } else {
            None
        }
    }

    pub fn previous_track(&mut self) -> Option<&Track> {
        if self.current_index > 0 {
            self.current_index -= 1;
            self.current_track()
        } else {
            None
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    // === persistence ===

    pub fn load(&mut self) {
        if let Err(e) = self.load_playlist() {
            warn!("PlaylistManager: could not load playlist: {}", e);
        }
        if let Err(e) = self.load_history() {
            warn!("PlaylistManager: could not load history: {}", e);
        }
    }

    fn load_playlist(&mut self) -> Result<(), StoreError> {
        if !self.playlist_path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.playlist_path)
            .map_err(|e| StoreError::Read { path: self.playlist_path.clone(), source: e })?;
        let file: PlaylistFile = serde_json::from_str(&content)
            .map_err(|e| StoreError::Json { path: self.playlist_path.clone(), source: e })?;

        self.tracks = file.tracks;
        self.current_index = if file.current_index < self.tracks.len() { file.current_index } else { 0 };
        info!("PlaylistManager: loaded {} tracks", self.tracks.len());
        Ok(())
    }

    pub fn save_playlist(&self) -> Result<(), StoreError> {
        let file = PlaylistFile { tracks: self.tracks.clone(), current_index: self.current_index };
        write_json(&self.playlist_path, &file)
    }

    fn load_history(&mut self) -> Result<(), StoreError> {
        if !self.history_path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.history_path)
            .map_err(|e| StoreError::Read { path: self.history_path.clone(), source: e })?;
        self.history = serde_json::from_str(&content)
            .map_err(|e| StoreError::Json { path: self.history_path.clone(), source: e })?;
        Ok(())
    }

    /// Snapshot the current playlist into the history file. The history
    /// keeps the last ten snapshots.
    pub fn save_history(&mut self) -> Result<(), StoreError> {
        if self.tracks.is_empty() {
            return Ok(());
        }
        self.history.push(HistoryEntry {
            tracks: self.tracks.clone(),
            current_index: self.current_index,
            timestamp: Utc::now(),
        });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
        write_json(&self.history_path, &self.history)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Restore a history snapshot into the current playlist. `None` picks
    /// the most recent one.
    pub fn restore_from_history(&mut self, index: Option<usize>) -> bool {
        let index = match index {
            Some(i) => i,
            None if !self.history.is_empty() => self.history.len() - 1,
            None => return false,
        };
        let Some(entry) = self.history.get(index) else {
            return false;
        };
        self.tracks = entry.tracks.clone();
        self.current_index =
            if entry.current_index < self.tracks.len() { entry.current_index } else { 0 };
        true
    }

    pub fn clear_history(&mut self) -> Result<(), StoreError> {
        self.history.clear();
        write_json(&self.history_path, &self.history)
    }

    pub fn export(&self, path: &Path) -> Result<(), StoreError> {
        if self.tracks.is_empty() {
            return Err(StoreError::Format("No tracks to export".into()));
        }
        let file = PlaylistFile { tracks: self.tracks.clone(), current_index: self.current_index };
        write_json(path, &file)
    }

    /// Append tracks from an exported playlist file.
    pub fn import(&mut self, path: &Path) -> Result<usize, StoreError> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Read { path: path.to_path_buf(), source: e })?;
        let file: PlaylistFile = serde_json::from_str(&content)
            .map_err(|e| StoreError::Json { path: path.to_path_buf(), source: e })?;

        let imported: Vec<Track> =
            file.tracks.into_iter().filter(|t| !t.title.is_empty() && !t.url.is_empty()).collect();
        if imported.is_empty() {
            return Err(StoreError::Format("No valid tracks found in file".into()));
        }

        let was_empty = self.tracks.is_empty();
        let count = imported.len();
        self.tracks.extend(imported);
        if was_empty {
            self.current_index = 0;
        }
        Ok(count)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::Write { path: path.to_path_buf(), source: e })?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).map_err(|e| StoreError::Write { path: path.to_path_buf(), source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn track(title: &str) -> Track {
        Track { title: title.to_string(), url: format!("http://example.com/{}.mp3", title), duration: 60 }
    }

    fn manager(dir: &tempfile::TempDir) -> PlaylistManager {
        PlaylistManager::new(dir.path().join("playlist.json"), dir.path().join("history.json"))
    }

    #[test]
    fn parse_duration_understands_common_formats() {
        assert_eq!(parse_duration("01:02:03"), 3723);
        assert_eq!(parse_duration("45:10"), 2710);
        assert_eq!(parse_duration("90"), 90);
        assert_eq!(parse_duration("abc"), 0);
        assert_eq!(parse_duration("1:2:3:4"), 0);
    }

    #[test]
    fn navigation_stops_at_playlist_ends() {
        let dir = tempdir().unwrap();
        let mut playlist = manager(&dir);
        playlist.add_track(track("a"));
        playlist.add_track(track("b"));

        assert!(playlist.previous_track().is_none());
        assert_eq!(playlist.next_track().unwrap().title, "b");
        assert!(playlist.next_track().is_none());
        assert_eq!(playlist.previous_track().unwrap().title, "a");
    }

    #[test]
    fn remove_track_adjusts_current_index() {
        let dir = tempdir().unwrap();
        let mut playlist = manager(&dir);
        playlist.add_track(track("a"));
        playlist.add_track(track("b"));
        playlist.add_track(track("c"));
        playlist.set_current_index(2);

        assert!(playlist.remove_track(0));
        assert_eq!(playlist.current_index(), 1);
        assert_eq!(playlist.current_track().unwrap().title, "c");

        assert!(!playlist.remove_track(10));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut playlist = manager(&dir);
        playlist.add_track(track("a"));
        playlist.add_track(track("b"));
        playlist.set_current_index(1);
        playlist.save_playlist().unwrap();

        let mut reloaded = manager(&dir);
        reloaded.load();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.current_index(), 1);
        assert_eq!(reloaded.current_track().unwrap().title, "b");
    }

    #[test]
    fn stale_current_index_resets_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("playlist.json");
        fs::write(
            &path,
            r#"{"tracks": [{"title": "a", "url": "http://example.com/a.mp3"}], "current_index": 9}"#,
        )
        .unwrap();

        let mut playlist = manager(&dir);
        playlist.load();
        assert_eq!(playlist.current_index(), 0);
    }

    #[test]
    fn history_keeps_last_ten_snapshots() {
        let dir = tempdir().unwrap();
        let mut playlist = manager(&dir);
        playlist.add_track(track("a"));

        for _ in 0..12 {
            playlist.save_history().unwrap();
        }
        assert_eq!(playlist.history().len(), 10);
    }

    #[test]
    fn restore_from_history_picks_most_recent_by_default() {
        let dir = tempdir().unwrap();
        let mut playlist = manager(&dir);
        playlist.add_track(track("a"));
        playlist.save_history().unwrap();
        playlist.add_track(track("b"));
        playlist.save_history().unwrap();

        playlist.clear();
        assert!(playlist.restore_from_history(None));
        assert_eq!(playlist.len(), 2);

        assert!(playlist.restore_from_history(Some(0)));
        assert_eq!(playlist.len(), 1);

        assert!(!playlist.restore_from_history(Some(42)));
    }

    #[test]
    fn clear_history_empties_the_file() {
        let dir = tempdir().unwrap();
        let mut playlist = manager(&dir);
        playlist.add_track(track("a"));
        playlist.save_history().unwrap();
        playlist.clear_history().unwrap();

        let mut reloaded = manager(&dir);
        reloaded.load();
        assert!(reloaded.history().is_empty());
        assert!(!reloaded.restore_from_history(None));
    }

    #[test]
    fn import_appends_and_skips_invalid_tracks() {
        let dir = tempdir().unwrap();
        let mut playlist = manager(&dir);
        playlist.add_track(track("a"));

        let file = dir.path().join("export.json");
        fs::write(
            &file,
            r#"{"tracks": [
                {"title": "b", "url": "http://example.com/b.mp3", "duration": 10},
                {"title": "", "url": "http://example.com/empty.mp3"}
            ], "current_index": 0}"#,
        )
        .unwrap();

        let count = playlist.import(&file).unwrap();
        assert_eq!(count, 1);
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn episode_conversion_parses_duration() {
        let episode = Episode::new(
            "Ep".into(),
            None,
            Utc::now(),
            Some("1:30".into()),
            "http://example.com/ep.mp3".into(),
        );
        let track = Track::from(&episode);
        assert_eq!(track.duration, 90);
        assert_eq!(track.url, "http://example.com/ep.mp3");
    }
}
