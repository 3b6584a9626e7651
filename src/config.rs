// src/config.rs
use crate::errors::StoreError;
use crate::podcast_factory::EpisodeLoadMode;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadModeSetting {
    All,
    Latest,
}

/// User settings persisted between sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub volume: f32,
    pub last_station_url: String,
    pub last_playlist_index: usize,
    pub theme: String,
    pub episode_load_mode: LoadModeSetting,
    pub latest_episode_count: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            volume: 0.7,
            last_station_url: String::new(),
            last_playlist_index: 0,
            theme: "dark".to_string(),
            episode_load_mode: LoadModeSetting::All,
            latest_episode_count: 10,
        }
    }
}

impl AppConfig {
    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("AppConfig: invalid settings in {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                warn!("AppConfig: could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Write { path: path.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| StoreError::Write { path: path.to_path_buf(), source: e })
    }

    pub fn load_mode(&self) -> EpisodeLoadMode {
        match self.episode_load_mode {
            LoadModeSetting::All => EpisodeLoadMode::All,
            LoadModeSetting::Latest => EpisodeLoadMode::Latest(self.latest_episode_count),
        }
    }
}

/// Where settings and data files live. Everything hangs off two base
/// directories so tests (and `--config-dir`) can point the whole app at a
/// temp location.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl ConfigPaths {
    pub fn resolve(override_dir: Option<PathBuf>) -> Option<Self> {
        if let Some(base) = override_dir {
            return Some(Self { config_dir: base.clone(), data_dir: base.join("data") });
        }
        let config_dir = dirs::config_dir()?.join("rustcast");
        let data_dir = dirs::data_dir()?.join("rustcast");
        Some(Self { config_dir, data_dir })
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    pub fn stations_file(&self) -> PathBuf {
        self.config_dir.join("stations.json")
    }

    pub fn playlist_file(&self) -> PathBuf {
        self.data_dir.join("playlist.json")
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    pub fn positions_file(&self) -> PathBuf {
        self.data_dir.join("positions.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("rustcast.log")
    }

    pub fn engine_socket(&self) -> PathBuf {
        self.data_dir.join(format!("mpv-{}.sock", std::process::id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("settings.json"));
        assert_eq!(config.volume, 0.7);
        assert_eq!(config.episode_load_mode, LoadModeSetting::All);
        assert_eq!(config.load_mode(), EpisodeLoadMode::All);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut config = AppConfig::default();
        config.volume = 0.4;
        config.last_station_url = "http://example.com/feed".to_string();
        config.episode_load_mode = LoadModeSetting::Latest;
        config.latest_episode_count = 5;
        config.save(&path).unwrap();

        let reloaded = AppConfig::load(&path);
        assert_eq!(reloaded.volume, 0.4);
        assert_eq!(reloaded.last_station_url, "http://example.com/feed");
        assert_eq!(reloaded.load_mode(), EpisodeLoadMode::Latest(5));
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"volume": 0.9}"#).unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(config.volume, 0.9);
        assert_eq!(config.latest_episode_count, 10);
    }

    #[test]
    fn invalid_settings_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(config.volume, 0.7);
    }

    #[test]
    fn override_dir_keeps_everything_together() {
        let paths = ConfigPaths::resolve(Some(PathBuf::from("/tmp/rc-test"))).unwrap();
        assert_eq!(paths.settings_file(), PathBuf::from("/tmp/rc-test/settings.json"));
        assert_eq!(paths.playlist_file(), PathBuf::from("/tmp/rc-test/data/playlist.json"));
    }
}
