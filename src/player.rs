// src/player.rs
//
// Transport over an external media engine (mpv) via its JSON IPC socket.
//
//   MpvPlayer::spawn_and_connect()
//         ├── writer task  ← receives requests over mpsc, writes JSON lines
//         └── reader task  ← reads JSON lines from the socket
//                              ├── response (request_id) → matching oneshot
//                              └── unsolicited event     → engine event channel
//
// `PlayerHandle` is cheaply cloneable; `send` fires a command and awaits
// the engine's reply.
use crate::errors::PlayerError;
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::Child;
use tokio::sync::{Mutex, mpsc, oneshot};

pub const SUPPORTED_SPEEDS: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const SOCKET_WAIT_ATTEMPTS: u32 = 50;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, PlayerError>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialized JSON line, newline included
    reply: oneshot::Sender<Result<Value, PlayerError>>,
}

/// An engine event that arrived without a request id (end-file and friends).
#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub raw: Value,
}

impl EngineEvent {
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// True when the current file ended by playing to its end, as opposed
    /// to being stopped or replaced.
    pub fn is_end_of_file(&self) -> bool {
        self.event_name() == Some("end-file")
            && self.raw.get("reason").and_then(Value::as_str) == Some("eof")
    }
}

// ── handle ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PendingRequest>,
    next_req_id: Arc<AtomicU64>,
}

impl PlayerHandle {
    pub async fn send(&self, command: Value) -> Result<Value, PlayerError> {
        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)
            .map_err(|e| PlayerError::Ipc(format!("failed to encode request: {}", e)))?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest { req_id, payload: raw, reply: reply_tx })
            .await
            .map_err(|_| PlayerError::ConnectionClosed)?;

        tokio::time::timeout(REQUEST_TIMEOUT, reply_rx)
            .await
            .map_err(|_| PlayerError::RequestTimeout)?
            .map_err(|_| PlayerError::ConnectionClosed)?
    }

    // ── transport verbs ──────────────────────────────────────────────────

    /// Load a URL, replacing whatever is playing. `start_secs` resumes at
    /// an offset without racing the file load.
    pub async fn load(&self, url: &str, start_secs: Option<f64>) -> Result<(), PlayerError> {
        match start_secs {
            Some(secs) => {
                self.send(json!(["loadfile", url, "replace", format!("start={:.1}", secs)])).await?
            }
            None => self.send(json!(["loadfile", url])).await?,
        };
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> Result<(), PlayerError> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn is_paused(&self) -> bool {
        match self.send(json!(["get_property", "pause"])).await {
            Ok(resp) => resp["data"].as_bool().unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Flip pause. Returns the new paused state.
    pub async fn toggle_pause(&self) -> Result<bool, PlayerError> {
        let paused = self.is_paused().await;
        self.set_pause(!paused).await?;
        Ok(!paused)
    }

    pub async fn seek_to(&self, secs: f64) -> Result<(), PlayerError> {
        self.send(json!(["set_property", "time-pos", secs])).await?;
        Ok(())
    }

    pub async fn seek_relative(&self, secs: f64) -> Result<(), PlayerError> {
        self.send(json!(["seek", secs, "relative"])).await?;
        Ok(())
    }

    /// Volume is 0.0–1.0 here; the engine speaks 0–100.
    pub async fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        let vol_pct = (volume * 100.0).clamp(0.0, 100.0);
        self.send(json!(["set_property", "volume", vol_pct])).await?;
        Ok(())
    }

    pub async fn set_speed(&self, speed: f64) -> Result<(), PlayerError> {
        if !SUPPORTED_SPEEDS.iter().any(|s| (s - speed).abs() < f64::EPSILON) {
            return Err(PlayerError::UnsupportedSpeed(speed));
        }
        self.send(json!(["set_property", "speed", speed])).await?;
        Ok(())
    }

    /// Current position in seconds; `None` while the engine is idle.
    pub async fn time_position(&self) -> Option<f64> {
        self.send(json!(["get_property", "time-pos"])).await.ok()?.get("data")?.as_f64()
    }

    pub async fn duration(&self) -> Option<f64> {
        self.send(json!(["get_property", "duration"])).await.ok()?.get("data")?.as_f64()
    }

    /// Health check: the engine answers property reads when alive.
    pub async fn ping(&self) -> Result<(), PlayerError> {
        self.send(json!(["get_property", "volume"])).await?;
        Ok(())
    }
}

// ── driver ───────────────────────────────────────────────────────────────

/// Owns the engine process and its IPC connection.
pub struct MpvPlayer {
    socket_path: PathBuf,
    process: Option<Child>,
}

impl MpvPlayer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path, process: None }
    }

    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<PlayerHandle, PlayerError> {
        self.shutdown().await;
        let _ = tokio::fs::remove_file(&self.socket_path).await;

        info!("mpv: spawning engine process");
        let child = tokio::process::Command::new("mpv")
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .arg("--quiet")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(PlayerError::Spawn)?;
        self.process = Some(child);

        for _ in 0..SOCKET_WAIT_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.socket_path.exists() {
                break;
            }
        }
        if !self.socket_path.exists() {
            return Err(PlayerError::SocketTimeout);
        }

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| PlayerError::Ipc(format!("connect failed: {}", e)))?;
        info!("mpv: connected to IPC socket");
        Ok(start_io_tasks(stream, event_tx))
    }

    pub async fn shutdown(&mut self) {
        if let Some(mut process) = self.process.take() {
            let _ = process.kill().await;
        }
        let _ = tokio::fs::remove_file(&self.socket_path).await;
    }
}

fn start_io_tasks(stream: UnixStream, event_tx: mpsc::Sender<EngineEvent>) -> PlayerHandle {
    let (read_half, write_half) = stream.into_split();

    // req_id → reply channel; the writer inserts, the reader resolves.
    let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    PlayerHandle { tx: cmd_tx, next_req_id: Arc::new(AtomicU64::new(1)) }
}

async fn reader_task(
    mut reader: BufReader<OwnedReadHalf>,
    pending: Pending,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, PlayerError::ConnectionClosed).await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let value: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = value.get("request_id").and_then(Value::as_u64) {
                    let mut map = pending.lock().await;
                    if let Some(reply) = map.remove(&req_id) {
                        let result = if value["error"].as_str() == Some("success") {
                            Ok(value)
                        } else {
                            let message =
                                value["error"].as_str().unwrap_or("unknown error").to_string();
                            Err(PlayerError::Ipc(message))
                        };
                        let _ = reply.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    let _ = event_tx.send(EngineEvent { raw: value }).await;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, PlayerError::Ipc(e.to_string())).await;
                break;
            }
        }
    }
}

async fn fail_pending(pending: &Pending, error: PlayerError) {
    let mut map = pending.lock().await;
    for (_, reply) in map.drain() {
        let _ = reply.send(Err(match &error {
            PlayerError::ConnectionClosed => PlayerError::ConnectionClosed,
            other => PlayerError::Ipc(other.to_string()),
        }));
    }
}

async fn writer_task(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<PendingRequest>,
    pending: Pending,
) {
    while let Some(request) = rx.recv().await {
        // Register the reply channel before writing so the reader can
        // always match the response
        {
            let mut map = pending.lock().await;
            map.insert(request.req_id, request.reply);
        }
        debug!("mpv writer: send req={} {}", request.req_id, request.payload.trim());
        if let Err(e) = writer.write_all(request.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            let mut map = pending.lock().await;
            if let Some(reply) = map.remove(&request.req_id) {
                let _ = reply.send(Err(PlayerError::Ipc(e.to_string())));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    #[test]
    fn end_of_file_requires_eof_reason() {
        let eof = EngineEvent { raw: json!({"event": "end-file", "reason": "eof"}) };
        let stopped = EngineEvent { raw: json!({"event": "end-file", "reason": "stop"}) };
        let other = EngineEvent { raw: json!({"event": "file-loaded"}) };

        assert!(eof.is_end_of_file());
        assert!(!stopped.is_end_of_file());
        assert!(!other.is_end_of_file());
        assert_eq!(other.event_name(), Some("file-loaded"));
    }

    /// A scripted engine on a real unix socket: answers every request with
    /// `success` plus canned data, and pushes one unsolicited event.
    async fn scripted_engine(dir: &tempfile::TempDir) -> (PlayerHandle, mpsc::Receiver<EngineEvent>) {
        let socket_path = dir.path().join("engine.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();

            write_half
                .write_all(b"{\"event\": \"end-file\", \"reason\": \"eof\"}\n")
                .await
                .unwrap();

            loop {
                line.clear();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    break;
                }
                let request: Value = serde_json::from_str(line.trim()).unwrap();
                let req_id = request["request_id"].as_u64().unwrap();
                let property = request["command"][1].as_str().unwrap_or("");
                let data = match property {
                    "time-pos" => json!(12.5),
                    "duration" => json!(600.0),
                    "pause" => json!(false),
                    _ => Value::Null,
                };
                let response =
                    json!({"error": "success", "request_id": req_id, "data": data}).to_string();
                write_half.write_all(format!("{}\n", response).as_bytes()).await.unwrap();
            }
        });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (event_tx, event_rx) = mpsc::channel(8);
        (start_io_tasks(stream, event_tx), event_rx)
    }

    #[tokio::test]
    async fn requests_are_correlated_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, _events) = scripted_engine(&dir).await;

        assert_eq!(handle.time_position().await, Some(12.5));
        assert_eq!(handle.duration().await, Some(600.0));
        assert!(!handle.is_paused().await);
        handle.ping().await.unwrap();
    }

    #[tokio::test]
    async fn transport_verbs_round_trip_through_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, _events) = scripted_engine(&dir).await;

        handle.load("http://example.com/ep.mp3", None).await.unwrap();
        handle.load("http://example.com/ep.mp3", Some(120.0)).await.unwrap();
        handle.set_pause(true).await.unwrap();
        assert!(handle.toggle_pause().await.unwrap());
        handle.seek_to(30.0).await.unwrap();
        handle.seek_relative(-10.0).await.unwrap();
        handle.set_volume(0.5).await.unwrap();
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn unsolicited_events_reach_the_event_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, mut events) = scripted_engine(&dir).await;

        let event = events.recv().await.unwrap();
        assert!(event.is_end_of_file());
        // Handle still works after the event
        handle.ping().await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_speed_is_rejected_without_io() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, _events) = scripted_engine(&dir).await;

        assert!(matches!(handle.set_speed(3.0).await, Err(PlayerError::UnsupportedSpeed(_))));
        handle.set_speed(1.5).await.unwrap();
    }
}
