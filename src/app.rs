// src/app.rs
use crate::config::{AppConfig, ConfigPaths};
use crate::event::AppEvent;
use crate::playback_memory::PlaybackMemory;
use crate::player::{PlayerHandle, SUPPORTED_SPEEDS};
use crate::playlist::{PlaylistManager, Track};
use crate::podcast::{Episode, FeedUrl, Podcast};
use crate::processor::FeedProcessor;
use crate::progress::format_time;
use crate::stations::{Station, StationManager};
use crate::ui;
use crate::widgets::scrollable_paragraph::ScrollableParagraphState;
use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use log::warn;
use ratatui::{Terminal, backend::Backend};
use std::io;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const VOLUME_STEP: f32 = 0.05;
const SEEK_STEP_SECS: i64 = 10;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum FocusedPanel {
    #[default]
    Stations,
    Episodes,
    Playlist,
    ShowNotes,
}

/// Last known transport state, updated from progress events.
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub playing: bool,
    pub paused: bool,
    pub loading: bool,
    pub position: u64,
    pub duration: u64,
    pub volume: f32,
    pub speed: f64,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            playing: false,
            paused: false,
            loading: false,
            position: 0,
            duration: 0,
            volume: 0.7,
            speed: 1.0,
        }
    }
}

/// Side effects requested by key handling or event application. The
/// runtime loop performs them; `on_key` itself never touches the network
/// or the media engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fetch { url: String },
    Play { track: Track },
    TogglePause,
    Stop,
    SeekRelative(i64),
    SetVolume(f32),
    SetSpeed(f64),
}

pub struct App {
    pub should_quit: bool,
    pub stations: StationManager,
    pub playlist: PlaylistManager,
    pub memory: PlaybackMemory,
    pub config: AppConfig,
    pub podcast: Option<Podcast>,
    pub station_list: Vec<Station>,
    pub selected_station_index: Option<usize>,
    pub selected_episode_index: Option<usize>,
    pub selected_track_index: Option<usize>,
    pub focused_panel: FocusedPanel,
    pub show_notes_state: ScrollableParagraphState,
    pub status: PlayerStatus,
    pub status_message: String,
    pub fetching: bool,
    pub playing_track: Option<Track>,
}

impl App {
    pub fn new(
        stations: StationManager,
        playlist: PlaylistManager,
        memory: PlaybackMemory,
        config: AppConfig,
    ) -> App {
        let mut app = App {
            should_quit: false,
            stations,
            playlist,
            memory,
            status: PlayerStatus { volume: config.volume, ..PlayerStatus::default() },
            config,
            podcast: None,
            station_list: Vec::new(),
            selected_station_index: None,
            selected_episode_index: None,
            selected_track_index: None,
            focused_panel: FocusedPanel::default(),
            show_notes_state: ScrollableParagraphState::default(),
            status_message: "Ready".to_string(),
            fetching: false,
            playing_track: None,
        };

        app.refresh_stations();
        if !app.playlist.is_empty() {
            app.selected_track_index = Some(app.playlist.current_index());
        }
        app.update_show_notes();
        app
    }

    // === selections ===

    pub fn refresh_stations(&mut self) {
        self.station_list = self.stations.stations();
        self.selected_station_index = if self.station_list.is_empty() {
            None
        } else {
            // Keep pointing at the last used station when we know it
            let last_used = self
                .station_list
                .iter()
                .position(|s| !self.config.last_station_url.is_empty() && s.url == self.config.last_station_url);
            let current = self.selected_station_index.map(|i| i.min(self.station_list.len() - 1));
            current.or(last_used).or(Some(0))
        };
    }

    pub fn selected_station(&self) -> Option<&Station> {
        self.selected_station_index.and_then(|i| self.station_list.get(i))
    }

    pub fn selected_episode(&self) -> Option<&Episode> {
        self.podcast
            .as_ref()
            .and_then(|p| self.selected_episode_index.and_then(|i| p.episodes().get(i)))
    }

    fn update_show_notes(&mut self) {
        let content = if let Some(episode) = self.selected_episode() {
            ui::format_description(episode.description())
        } else if self.podcast.is_some() {
            "Select an episode to see its show notes.".to_string()
        } else {
            "Fetch a station to see episodes and show notes.".to_string()
        };
        self.show_notes_state.set_content(content);
    }

    // === panel focus ===

    pub fn focus_next_panel(&mut self) {
        self.focused_panel = match self.focused_panel {
            FocusedPanel::Stations => FocusedPanel::Episodes,
            FocusedPanel::Episodes => FocusedPanel::Playlist,
            FocusedPanel::Playlist => FocusedPanel::ShowNotes,
            FocusedPanel::ShowNotes => FocusedPanel::Stations,
        };
    }

    pub fn focus_prev_panel(&mut self) {
        self.focused_panel = match self.focused_panel {
            FocusedPanel::Stations => FocusedPanel::ShowNotes,
            FocusedPanel::Episodes => FocusedPanel::Stations,
            FocusedPanel::Playlist => FocusedPanel::Episodes,
            FocusedPanel::ShowNotes => FocusedPanel::Playlist,
        };
    }

    fn select_in_focused_list(&mut self, forward: bool) {
        match self.focused_panel {
            FocusedPanel::Stations => {
                self.selected_station_index =
                    cycle_selection(self.selected_station_index, self.station_list.len(), forward);
            }
            FocusedPanel::Episodes => {
                let len = self.podcast.as_ref().map_or(0, |p| p.episodes().len());
                self.selected_episode_index =
                    cycle_selection(self.selected_episode_index, len, forward);
                self.update_show_notes();
            }
            FocusedPanel::Playlist => {
                self.selected_track_index =
                    cycle_selection(self.selected_track_index, self.playlist.len(), forward);
            }
            FocusedPanel::ShowNotes => {
                if forward {
                    self.show_notes_state.scroll_down(1);
                } else {
                    self.show_notes_state.scroll_up(1);
                }
            }
        }
    }

    // === key handling ===

    pub fn on_key(&mut self, key: KeyCode) -> Option<Command> {
        match key {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return None;
            }
            KeyCode::Char(' ') => {
                if self.status.playing {
                    return Some(Command::TogglePause);
                }
                return None;
            }
            KeyCode::Char('s') => {
                if self.status.playing {
                    self.note_stopped();
                    return Some(Command::Stop);
                }
                return None;
            }
            KeyCode::Char('n') => return self.advance_track(true),
            KeyCode::Char('p') => return self.advance_track(false),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let volume = (self.status.volume + VOLUME_STEP).min(1.0);
                return Some(Command::SetVolume(volume));
            }
            KeyCode::Char('-') => {
                let volume = (self.status.volume - VOLUME_STEP).max(0.0);
                return Some(Command::SetVolume(volume));
            }
            KeyCode::Char('[') => {
                if self.status.playing {
                    return Some(Command::SeekRelative(-SEEK_STEP_SECS));
                }
                return None;
            }
            KeyCode::Char(']') => {
                if self.status.playing {
                    return Some(Command::SeekRelative(SEEK_STEP_SECS));
                }
                return None;
            }
            KeyCode::Char('x') => return Some(Command::SetSpeed(self.next_speed())),
            KeyCode::Char('h') => {
                if self.playlist.restore_from_history(None) {
                    self.selected_track_index = Some(self.playlist.current_index());
                    self.status_message = "Restored playlist from history".to_string();
                } else {
                    self.status_message = "No playlist history".to_string();
                }
                return None;
            }
            KeyCode::Tab | KeyCode::Right => {
                self.focus_next_panel();
                return None;
            }
            KeyCode::BackTab | KeyCode::Left => {
                self.focus_prev_panel();
                return None;
            }
            KeyCode::Down => {
                self.select_in_focused_list(true);
                return None;
            }
            KeyCode::Up => {
                self.select_in_focused_list(false);
                return None;
            }
            _ => {}
        }

        match self.focused_panel {
            FocusedPanel::Stations => match key {
                KeyCode::Enter | KeyCode::Char('r') => {
                    self.selected_station().map(|s| Command::Fetch { url: s.url.clone() })
                }
                KeyCode::Char('d') => {
                    self.delete_selected_station();
                    None
                }
                _ => None,
            },
            FocusedPanel::Episodes => match key {
                KeyCode::Enter => self.enqueue_and_play_selected_episode(),
                _ => None,
            },
            FocusedPanel::Playlist => match key {
                KeyCode::Enter => {
                    let index = self.selected_track_index?;
                    if self.playlist.set_current_index(index) {
                        return self.playlist.current_track().cloned().map(|track| Command::Play { track });
                    }
                    None
                }
                _ => None,
            },
            FocusedPanel::ShowNotes => match key {
                KeyCode::PageDown => {
                    self.show_notes_state.page_down();
                    None
                }
                KeyCode::PageUp => {
                    self.show_notes_state.page_up();
                    None
                }
                _ => None,
            },
        }
    }

    fn enqueue_and_play_selected_episode(&mut self) -> Option<Command> {
        let episode = self.selected_episode()?.clone();
        let index = self.playlist.add_episode(&episode);
        self.playlist.set_current_index(index);
        self.selected_track_index = Some(index);
        self.playlist.current_track().cloned().map(|track| Command::Play { track })
    }

    fn advance_track(&mut self, forward: bool) -> Option<Command> {
        let track = if forward { self.playlist.next_track() } else { self.playlist.previous_track() };
        match track.cloned() {
            Some(track) => {
                self.selected_track_index = Some(self.playlist.current_index());
                Some(Command::Play { track })
            }
            None => {
                self.status_message = if forward {
                    "End of playlist".to_string()
                } else {
                    "Start of playlist".to_string()
                };
                None
            }
        }
    }

    fn delete_selected_station(&mut self) {
        let Some(station) = self.selected_station().cloned() else {
            return;
        };
        match self.stations.delete(&station.name) {
            Ok(()) => {
                self.status_message = format!("Deleted station '{}'", station.name);
                self.refresh_stations();
            }
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn next_speed(&self) -> f64 {
        let current = SUPPORTED_SPEEDS.iter().position(|s| (s - self.status.speed).abs() < 1e-9);
        match current {
            Some(i) => SUPPORTED_SPEEDS[(i + 1) % SUPPORTED_SPEEDS.len()],
            // Off-list speed resets to normal
            None => 1.0,
        }
    }

    // === event application ===

    pub fn apply_event(&mut self, event: AppEvent) -> Option<Command> {
        match event {
            AppEvent::PodcastReady { podcast } => {
                self.status_message = format!(
                    "Loaded {} episodes from '{}'",
                    podcast.episodes().len(),
                    podcast.title()
                );
                self.playlist.populate_from_episodes(podcast.episodes());
                self.selected_episode_index =
                    if podcast.episodes().is_empty() { None } else { Some(0) };
                self.selected_track_index = if self.playlist.is_empty() { None } else { Some(0) };
                self.podcast = Some(podcast);
                self.update_show_notes();
                None
            }
            AppEvent::FetchFailed { message } => {
                self.status_message = message;
                None
            }
            AppEvent::FetchFinished => {
                self.fetching = false;
                None
            }
            AppEvent::PlaybackProgress { position, duration } => {
                self.status.playing = true;
                self.status.loading = false;
                self.status.position = position;
                self.status.duration = duration;
                if let Some(track) = &self.playing_track {
                    self.memory.update_position(
                        &track.url,
                        &track.title,
                        position as f64,
                        duration as f64,
                    );
                }
                None
            }
            AppEvent::TrackFinished => {
                if let Some(track) = self.playing_track.take() {
                    self.memory.mark_completed(&track.url);
                }
                self.status.playing = false;
                self.status.position = 0;
                match self.playlist.next_track().cloned() {
                    Some(track) => {
                        self.selected_track_index = Some(self.playlist.current_index());
                        Some(Command::Play { track })
                    }
                    None => {
                        self.status_message = "Playlist finished".to_string();
                        None
                    }
                }
            }
            AppEvent::PlayerDied { message } => {
                self.status.playing = false;
                self.status.loading = false;
                self.status_message = message;
                None
            }
        }
    }

    // === playback bookkeeping ===

    pub fn note_fetch_started(&mut self, url: &str) {
        self.fetching = true;
        self.status_message = format!("Fetching {}...", url);
        self.config.last_station_url = url.to_string();
    }

    pub fn note_play_started(&mut self, track: Track, resumed_from: Option<f64>) {
        self.memory.start_episode(&track.url);
        self.status_message = match resumed_from {
            Some(secs) => format!("Resuming '{}' at {}", track.title, format_time(secs as u64)),
            None => format!("Playing '{}'", track.title),
        };
        self.status.playing = true;
        self.status.paused = false;
        self.status.loading = true;
        self.status.position = resumed_from.unwrap_or(0.0) as u64;
        self.status.duration = track.duration;
        self.playing_track = Some(track);
    }

    pub fn note_stopped(&mut self) {
        self.status.playing = false;
        self.status.paused = false;
        self.status.loading = false;
        self.status.position = 0;
        self.status.duration = 0;
        self.playing_track = None;
        self.status_message = "Stopped".to_string();
    }

    /// Persist everything that survives a session.
    pub fn save_state(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.config.volume = self.status.volume;
        self.config.last_playlist_index = self.playlist.current_index();
        self.config.save(&paths.settings_file())?;
        self.playlist.save_playlist()?;
        self.playlist.save_history()?;
        self.memory.save(true)?;
        Ok(())
    }
}

fn cycle_selection(current: Option<usize>, len: usize, forward: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match current {
        None => {
            if forward {
                0
            } else {
                len - 1
            }
        }
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
    })
}

// === runtime loop ===

pub async fn start_ui(
    app: &mut App,
    processor: FeedProcessor,
    player: PlayerHandle,
    event_tx: UnboundedSender<AppEvent>,
    event_rx: UnboundedReceiver<AppEvent>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_loop(&mut terminal, app, &processor, &player, &event_tx, event_rx).await;

    // A fetch still in flight must not deliver into a dead UI
    processor.cancel();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

pub async fn run_app_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    processor: &FeedProcessor,
    player: &PlayerHandle,
    event_tx: &UnboundedSender<AppEvent>,
    mut event_rx: UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let mut input = EventStream::new();

    while !app.should_quit {
        let frame_size = terminal.get_frame().size();
        ui::prepare_layout(app, frame_size);
        terminal.draw(|f| ui::render(f, app))?;

        let command = tokio::select! {
            maybe_input = input.next() => {
                match maybe_input {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        app.on_key(key.code)
                    }
                    Some(Ok(_)) => None,
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }
            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => app.apply_event(event),
                    None => break,
                }
            }
        };

        if let Some(command) = command {
            execute_command(app, command, processor, player, event_tx).await;
        }
    }

    Ok(())
}

pub async fn execute_command(
    app: &mut App,
    command: Command,
    processor: &FeedProcessor,
    player: &PlayerHandle,
    event_tx: &UnboundedSender<AppEvent>,
) {
    match command {
        Command::Fetch { url } => {
            if processor.spawn_fetch(FeedUrl::new(&url), event_tx.clone()) {
                app.note_fetch_started(&url);
            } else {
                app.status_message = "A fetch is already running".to_string();
            }
        }
        Command::Play { track } => {
            let resume = app.memory.resume_position(&track.url).map(|p| p.position_seconds);
            match player.load(&track.url, resume).await {
                Ok(()) => app.note_play_started(track, resume),
                Err(e) => {
                    warn!("playback failed: {}", e);
                    app.status_message = format!("Playback failed: {}", e);
                }
            }
        }
        Command::TogglePause => match player.toggle_pause().await {
            Ok(paused) => {
                app.status.paused = paused;
                app.status_message = if paused { "Paused" } else { "Playing" }.to_string();
            }
            Err(e) => app.status_message = format!("Pause failed: {}", e),
        },
        Command::Stop => {
            if let Err(e) = player.stop().await {
                warn!("stop failed: {}", e);
            }
        }
        Command::SeekRelative(secs) => {
            if let Err(e) = player.seek_relative(secs as f64).await {
                warn!("seek failed: {}", e);
            }
        }
        Command::SetVolume(volume) => match player.set_volume(volume).await {
            Ok(()) => {
                app.status.volume = volume;
                app.config.volume = volume;
                app.status_message = format!("Volume {}%", (volume * 100.0).round() as u32);
            }
            Err(e) => app.status_message = format!("Volume change failed: {}", e),
        },
        Command::SetSpeed(speed) => match player.set_speed(speed).await {
            Ok(()) => {
                app.status.speed = speed;
                app.status_message = format!("Speed {}x", speed);
            }
            Err(e) => app.status_message = format!("Speed change failed: {}", e),
        },
    }
}
