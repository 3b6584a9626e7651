// src/stations.rs
use crate::errors::StoreError;
use crate::opml::opml_parser::{stations_from_opml_file, stations_to_opml};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A saved feed subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub added: usize,
    pub updated: usize,
}

/// Station favorites, persisted as a flat JSON object of name → feed URL.
/// The map is keyed by name, so listings come out sorted.
pub struct StationManager {
    path: PathBuf,
    stations: BTreeMap<String, String>,
}

impl StationManager {
    pub fn new(path: PathBuf) -> Self {
        Self { path, stations: BTreeMap::new() }
    }

    /// Load stations from disk. A missing file is an empty station list,
    /// not an error.
    pub fn load(&mut self) -> Result<(), StoreError> {
        if !self.path.exists() {
            self.stations.clear();
            return Ok(());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Read { path: self.path.clone(), source: e })?;
        self.stations = serde_json::from_str(&content)
            .map_err(|e| StoreError::Json { path: self.path.clone(), source: e })?;
        info!("StationManager: loaded {} stations", self.stations.len());
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        write_station_map(&self.path, &self.stations)
    }

    /// Add a station. Empty names/URLs and duplicate names are rejected.
    pub fn add(&mut self, name: &str, url: &str) -> Result<(), StoreError> {
        if name.trim().is_empty() || url.trim().is_empty() {
            return Err(StoreError::Format("Station name and URL must not be empty".into()));
        }
        if self.stations.contains_key(name) {
            return Err(StoreError::Format(format!("Station '{}' already exists", name)));
        }
        self.stations.insert(name.to_string(), url.to_string());
        self.save()
    }

    /// Rename and/or repoint an existing station.
    pub fn update(&mut self, old_name: &str, new_name: &str, new_url: &str) -> Result<(), StoreError> {
        if new_name.trim().is_empty() || new_url.trim().is_empty() {
            return Err(StoreError::Format("Station name and URL must not be empty".into()));
        }
        if !self.stations.contains_key(old_name) {
            return Err(StoreError::Format(format!("No station named '{}'", old_name)));
        }
        if old_name != new_name && self.stations.contains_key(new_name) {
            return Err(StoreError::Format(format!("Station '{}' already exists", new_name)));
        }
        if old_name != new_name {
            self.stations.remove(old_name);
        }
        self.stations.insert(new_name.to_string(), new_url.to_string());
        self.save()
    }

    pub fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        if self.stations.remove(name).is_none() {
            return Err(StoreError::Format(format!("No station named '{}'", name)));
        }
        self.save()
    }

    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.stations.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// All stations, sorted by name.
    pub fn stations(&self) -> Vec<Station> {
        self.stations
            .iter()
            .map(|(name, url)| Station { name: name.clone(), url: url.clone() })
            .collect()
    }

    /// Case-insensitive match over names and URLs.
    pub fn search(&self, query: &str) -> Vec<Station> {
        if query.is_empty() {
            return self.stations();
        }
        let query = query.to_lowercase();
        self.stations
            .iter()
            .filter(|(name, url)| {
                name.to_lowercase().contains(&query) || url.to_lowercase().contains(&query)
            })
            .map(|(name, url)| Station { name: name.clone(), url: url.clone() })
            .collect()
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.stations.clear();
        self.save()
    }

    /// Merge stations from another JSON file into this list. Entries with
    /// existing names overwrite the stored URL.
    pub fn import_json(&mut self, path: &Path) -> Result<ImportSummary, StoreError> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Read { path: path.to_path_buf(), source: e })?;
        let imported: BTreeMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| StoreError::Json { path: path.to_path_buf(), source: e })?;

        let summary = self.merge(imported);
        if summary.added == 0 && summary.updated == 0 {
            return Err(StoreError::Format("No valid stations found in file".into()));
        }
        self.save()?;
        Ok(summary)
    }

    pub fn export_json(&self, path: &Path) -> Result<(), StoreError> {
        if self.stations.is_empty() {
            return Err(StoreError::Format("No stations to export".into()));
        }
        write_station_map(path, &self.stations)
    }

    pub fn import_opml(&mut self, path: &Path) -> Result<ImportSummary, StoreError> {
        let entries = stations_from_opml_file(path)
            .map_err(|e| StoreError::Format(format!("OPML import failed: {}", e)))?;
        let imported: BTreeMap<String, String> =
            entries.into_iter().map(|s| (s.name, s.url)).collect();

        let summary = self.merge(imported);
        if summary.added == 0 && summary.updated == 0 {
            return Err(StoreError::Format("No valid stations found in file".into()));
        }
        self.save()?;
        Ok(summary)
    }

    pub fn export_opml(&self, path: &Path) -> Result<(), StoreError> {
        if self.stations.is_empty() {
            return Err(StoreError::Format("No stations to export".into()));
        }
        let document = stations_to_opml("rustcast stations", &self.stations())
            .map_err(|e| StoreError::Format(format!("OPML export failed: {}", e)))?;
        fs::write(path, document)
            .map_err(|e| StoreError::Write { path: path.to_path_buf(), source: e })
    }

    /// Write a copy of the current list, e.g. before a destructive import.
    pub fn backup(&self, path: &Path) -> Result<(), StoreError> {
        write_station_map(path, &self.stations)
    }

    fn merge(&mut self, imported: BTreeMap<String, String>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for (name, url) in imported {
            if name.trim().is_empty() || url.trim().is_empty() {
                warn!("StationManager: skipping import entry with empty name or URL");
                continue;
            }
            if self.stations.insert(name, url).is_some() {
                summary.updated += 1;
            } else {
                summary.added += 1;
            }
        }
        summary
    }
}

fn write_station_map(path: &Path, stations: &BTreeMap<String, String>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::Write { path: path.to_path_buf(), source: e })?;
    }
    let content = serde_json::to_string_pretty(stations)?;
    fs::write(path, content).map_err(|e| StoreError::Write { path: path.to_path_buf(), source: e })
}
