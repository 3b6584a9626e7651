// src/progress.rs
use crate::event::AppEvent;
use crate::player::{EngineEvent, PlayerHandle};
use log::{debug, info};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll the engine for position/duration and forward engine events. Emits
/// `PlaybackProgress` while something is playing and `TrackFinished` when
/// the current file plays to its end.
pub fn spawn_progress_task(
    handle: PlayerHandle,
    mut engine_events: mpsc::Receiver<EngineEvent>,
    events: UnboundedSender<AppEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // time-pos is unavailable while the engine idles, so a
                    // None here simply means nothing is playing
                    if let Some(position) = handle.time_position().await {
                        let duration = handle.duration().await.unwrap_or(0.0);
                        let sent = events.send(AppEvent::PlaybackProgress {
                            position: position.max(0.0) as u64,
                            duration: duration.max(0.0) as u64,
                        });
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                engine_event = engine_events.recv() => {
                    match engine_event {
                        Some(event) if event.is_end_of_file() => {
                            info!("progress: track finished");
                            if events.send(AppEvent::TrackFinished).is_err() {
                                break;
                            }
                        }
                        Some(event) => {
                            debug!("progress: engine event {:?}", event.event_name());
                        }
                        None => {
                            let _ = events.send(AppEvent::PlayerDied {
                                message: "media engine connection lost".to_string(),
                            });
                            break;
                        }
                    }
                }
            }
        }
        debug!("progress: task exiting");
    })
}

/// Seconds → "MM:SS", or "HH:MM:SS" from one hour up.
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_switches_to_hours() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(59), "00:59");
        assert_eq!(format_time(125), "02:05");
        assert_eq!(format_time(3600), "01:00:00");
        assert_eq!(format_time(3723), "01:02:03");
    }
}
