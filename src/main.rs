// src/main.rs
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};
use rustcast::app::{self, App};
use rustcast::config::{AppConfig, ConfigPaths};
use rustcast::event::AppEvent;
use rustcast::playback_memory::PlaybackMemory;
use rustcast::player::MpvPlayer;
use rustcast::playlist::PlaylistManager;
use rustcast::podcast::FeedUrl;
use rustcast::podcast_fetch::{HttpFeedFetcher, fetch_podcast};
use rustcast::processor::FeedProcessor;
use rustcast::progress::{format_time, spawn_progress_task};
use rustcast::stations::{ImportSummary, StationManager};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "rustcast", version, about = "A terminal podcast player")]
struct Cli {
    /// Base directory for settings and data (defaults to the platform
    /// config/data directories)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log level for the log file (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a station (a named feed subscription)
    Add { name: String, url: String },
    /// Delete a station
    Remove { name: String },
    /// List saved stations
    List,
    /// Merge stations from a .json or .opml file
    Import { file: PathBuf },
    /// Write all stations to a .json or .opml file
    Export { file: PathBuf },
    /// Fetch a feed (by station name or URL) and print its episodes
    Fetch { target: String },
    /// Show playback statistics and recently played episodes
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = ConfigPaths::resolve(cli.config_dir.clone())
        .ok_or_else(|| anyhow!("could not determine config/data directories"))?;
    setup_logging(&paths, &cli.log_level)?;

    let mut stations = StationManager::new(paths.stations_file());
    stations.load().context("failed to load stations")?;

    match cli.command {
        Some(Commands::Add { name, url }) => {
            stations.add(&name, &url)?;
            println!("Added station '{}' -> {}", name, url);
        }
        Some(Commands::Remove { name }) => {
            stations.delete(&name)?;
            println!("Removed station '{}'", name);
        }
        Some(Commands::List) => {
            if stations.is_empty() {
                println!("No stations saved. Add one with: rustcast add <name> <url>");
            }
            for station in stations.stations() {
                println!("{:<30} {}", station.name, station.url);
            }
        }
        Some(Commands::Import { file }) => {
            // Keep a copy of the old list around in case the merge was a mistake
            if !stations.is_empty() {
                let backup = paths.stations_file().with_extension("json.bak");
                stations.backup(&backup)?;
                println!("Backed up current stations to {}", backup.display());
            }
            let summary = import_stations(&mut stations, &file)?;
            println!("Imported {} new stations, updated {}", summary.added, summary.updated);
        }
        Some(Commands::Export { file }) => {
            export_stations(&stations, &file)?;
            println!("Exported {} stations to {}", stations.len(), file.display());
        }
        Some(Commands::Fetch { target }) => {
            let url = stations.url_for(&target).map(String::from).unwrap_or(target);
            let config = AppConfig::load(&paths.settings_file());
            let fetcher = HttpFeedFetcher::new();
            let podcast =
                fetch_podcast(&FeedUrl::new(&url), &fetcher, config.load_mode()).await?;
            println!("{}", podcast);
            println!();
            for (i, episode) in podcast.episodes().iter().enumerate() {
                let duration = episode.duration().unwrap_or("--:--");
                println!(
                    "{:>4}  {}  {:>9}  {}",
                    i + 1,
                    episode.published().format("%Y-%m-%d"),
                    duration,
                    episode.title()
                );
            }
        }
        Some(Commands::Stats) => {
            let memory = PlaybackMemory::new(paths.positions_file());
            let stats = memory.statistics();
            println!("Episodes tracked : {}", stats.total_episodes);
            println!("Completed        : {}", stats.completed_episodes);
            println!("In progress      : {}", stats.in_progress_episodes);
            println!("Listening hours  : {:.1}", stats.total_listening_hours);
            println!("Total plays      : {}", stats.total_play_count);
            if let Some((title, count)) = stats.most_played {
                println!("Most played      : {} ({}x)", title, count);
            }
            let recent = memory.recently_played(10);
            if !recent.is_empty() {
                println!("\nRecently played:");
                for position in recent {
                    println!(
                        "  {}  {} / {}  {}",
                        position.last_played.format("%Y-%m-%d"),
                        format_time(position.position_seconds as u64),
                        format_time(position.duration_seconds as u64),
                        position.episode_title
                    );
                }
            }
        }
        None => run_tui(paths, stations).await?,
    }

    Ok(())
}

async fn run_tui(paths: ConfigPaths, stations: StationManager) -> Result<()> {
    let config = AppConfig::load(&paths.settings_file());

    let mut playlist = PlaylistManager::new(paths.playlist_file(), paths.history_file());
    playlist.load();
    playlist.set_current_index(config.last_playlist_index);

    let memory = PlaybackMemory::new(paths.positions_file());

    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (engine_tx, engine_rx) = mpsc::channel(64);

    let mut engine = MpvPlayer::new(paths.engine_socket());
    let player = engine
        .spawn_and_connect(engine_tx)
        .await
        .context("failed to start the media engine (is mpv installed?)")?;
    player.set_volume(config.volume).await?;

    let progress_task = spawn_progress_task(player.clone(), engine_rx, event_tx.clone());

    let processor =
        FeedProcessor::new(Arc::new(HttpFeedFetcher::new()), config.load_mode());

    let mut app = App::new(stations, playlist, memory, config);

    // Pick up where the last session left off
    let last_url = app.config.last_station_url.clone();
    if !last_url.is_empty() && processor.spawn_fetch(FeedUrl::new(&last_url), event_tx.clone()) {
        app.note_fetch_started(&last_url);
    }

    info!("rustcast: starting UI");
    let res = app::start_ui(&mut app, processor, player.clone(), event_tx, event_rx).await;

    progress_task.abort();
    let _ = player.stop().await;
    engine.shutdown().await;

    if let Err(e) = app.save_state(&paths) {
        eprintln!("Failed to save state: {}", e);
    }

    res
}

fn import_stations(stations: &mut StationManager, file: &Path) -> Result<ImportSummary> {
    match extension_of(file).as_deref() {
        Some("opml") | Some("xml") => Ok(stations.import_opml(file)?),
        _ => Ok(stations.import_json(file)?),
    }
}

fn export_stations(stations: &StationManager, file: &Path) -> Result<()> {
    match extension_of(file).as_deref() {
        Some("opml") | Some("xml") => Ok(stations.export_opml(file)?),
        _ => Ok(stations.export_json(file)?),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase())
}

fn setup_logging(paths: &ConfigPaths, level: &str) -> Result<()> {
    let level = LevelFilter::from_str(level).context("invalid log level")?;
    if level == LevelFilter::Off {
        return Ok(());
    }

    std::fs::create_dir_all(&paths.data_dir)?;
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // The TUI owns the terminal, so logs go to a file only
        .chain(fern::log_file(paths.log_file())?)
        .apply()?;
    Ok(())
}
