//! Inter-process communication between the posture daemon and posturectl
//!
//! We use Unix domain sockets for local IPC. Each connection carries one
//! JSON command terminated by a newline and gets back one JSON response.
//! The shared data model (settings, exercises) lives here too so both
//! sides agree on the wire format.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

mod exercise;
mod settings;

pub use exercise::Exercise;
pub use settings::{
    parse_hhmm, Language, Settings, WorkHours, DEFAULT_CATEGORIES, DEFAULT_INTERVAL_MINUTES,
    MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES,
};

/// Intents that posturectl (or the popup) can send to the daemon.
///
/// Every command is idempotent and safe to resend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    StartTimer,
    StopTimer,
    ResetAlarm,
    ResumeAlarm { delay_minutes: f64 },
    Pause,
    Resume,
    Status,
    GetSettings,
    UpdateSettings(Settings),
    GetExercises,
    KeepAlive,
}

/// Responses from the daemon back to posturectl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Ack(Ack),
    Status(SchedulerStatus),
    Settings(Settings),
    Exercises(Vec<Exercise>),
    Error(String),
}

/// Acknowledgement of an intent. Scheduling intents carry the resulting
/// next fire time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
    pub next_fire: Option<i64>,
}

impl Ack {
    pub fn scheduled(next_fire: i64, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            next_fire: Some(next_fire),
        }
    }

    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            next_fire: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            next_fire: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: TimerState,
    /// Epoch milliseconds of the next reminder, only while running.
    pub next_fire: Option<i64>,
    /// Remaining countdown captured at pause, only while paused.
    pub paused_remaining_ms: Option<u64>,
    pub interval_minutes: u32,
    /// True when this status check had to restore a lost schedule.
    pub healed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Stopped,
    Running,
    Paused,
}

impl TimerState {
    pub fn from_flags(timer_started: bool, is_paused: bool) -> Self {
        match (timer_started, is_paused) {
            (false, _) => TimerState::Stopped,
            (true, false) => TimerState::Running,
            (true, true) => TimerState::Paused,
        }
    }
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused - is the posture daemon running?")]
    ConnectionRefused,
}

pub const SOCKET_PATH: &str = "/tmp/posture.sock";

/// Send one command to the daemon listening on `socket_path` and wait for
/// its response.
pub async fn send_command(socket_path: &str, cmd: &Command) -> Result<Response, IpcError> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::NotFound => IpcError::ConnectionRefused,
            _ => IpcError::Io(e),
        })?;

    let msg = serde_json::to_vec(cmd)?;
    stream.write_all(&msg).await?;
    stream.write_all(b"\n").await?;

    // The server closes its half after writing, so read to the end.
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(serde_json::from_slice(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::UnixListener;

    #[test]
    fn state_follows_lifecycle_flags() {
        assert_eq!(TimerState::from_flags(false, true), TimerState::Stopped);
        assert_eq!(TimerState::from_flags(true, false), TimerState::Running);
        assert_eq!(TimerState::from_flags(true, true), TimerState::Paused);
    }

    #[tokio::test]
    async fn send_command_reads_whole_response() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("posture.sock");
        let listener = UnixListener::bind(&path).expect("bind");

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (reader, mut writer) = stream.into_split();
            let mut line = String::new();
            BufReader::new(reader)
                .read_line(&mut line)
                .await
                .expect("read");
            let cmd: Command = serde_json::from_str(&line).expect("command");
            assert!(matches!(cmd, Command::ResumeAlarm { delay_minutes } if delay_minutes == 5.0));
            // Larger than a single small read buffer.
            let exercises = (0..64)
                .map(|i| Exercise::new(format!("stretch {i}"), "hold for ten seconds", "neck"))
                .collect();
            let body = serde_json::to_vec(&Response::Exercises(exercises)).expect("encode");
            writer.write_all(&body).await.expect("write");
        });

        let response = send_command(
            path.to_str().expect("utf8 path"),
            &Command::ResumeAlarm { delay_minutes: 5.0 },
        )
        .await
        .expect("response");
        server.await.expect("server task");

        match response {
            Response::Exercises(list) => assert_eq!(list.len(), 64),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_socket_reports_daemon_down() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.sock");
        let err = send_command(path.to_str().expect("utf8 path"), &Command::Status)
            .await
            .expect_err("no daemon");
        assert!(matches!(err, IpcError::ConnectionRefused));
    }
}
