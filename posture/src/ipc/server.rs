//! Unix domain socket server for IPC

use crate::scheduler::Scheduler;
use anyhow::Result;
use chrono::Local;
use posture_ipc::{Command, Response};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

pub async fn start(socket_path: String, scheduler: Arc<Mutex<Scheduler>>) -> Result<()> {
    // Remove old socket if it exists
    let _ = std::fs::remove_file(&socket_path);

    let listener = UnixListener::bind(&socket_path)?;
    info!("IPC server listening on {}", socket_path);

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let scheduler = scheduler.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, scheduler).await {
                        error!("Error handling client: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client(stream: UnixStream, scheduler: Arc<Mutex<Scheduler>>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader.read_line(&mut line).await?;
    let response = match serde_json::from_str::<Command>(&line) {
        Ok(command) => {
            debug!(?command, "intent received");
            let mut scheduler = scheduler.lock().await;
            dispatch(&mut scheduler, command)
        }
        Err(e) => Response::Error(format!("malformed command: {e}")),
    };

    let response_json = serde_json::to_vec(&response)?;
    writer.write_all(&response_json).await?;
    writer.shutdown().await?;

    Ok(())
}

/// Run one intent against the scheduler. Storage failures are logged here
/// and reported to the client; the next tick retries on its own.
pub fn dispatch(scheduler: &mut Scheduler, command: Command) -> Response {
    let now = Local::now();
    let result = match command {
        Command::StartTimer => scheduler.start(now).map(Response::Ack),
        Command::StopTimer => scheduler.stop(now).map(Response::Ack),
        Command::ResetAlarm => scheduler.reset_alarm(now).map(Response::Ack),
        Command::ResumeAlarm { delay_minutes } => {
            scheduler.resume_alarm(delay_minutes, now).map(Response::Ack)
        }
        Command::Pause => scheduler.pause(now).map(Response::Ack),
        Command::Resume => scheduler.resume(now).map(Response::Ack),
        Command::Status => scheduler.status(now).map(Response::Status),
        Command::GetSettings => scheduler.settings().map(Response::Settings),
        Command::UpdateSettings(settings) => {
            scheduler.reconfigure(settings, now).map(Response::Ack)
        }
        Command::GetExercises => scheduler.exercises().map(Response::Exercises),
        Command::KeepAlive => scheduler.keep_alive(now).map(Response::Ack),
    };
    result.unwrap_or_else(|e| {
        error!(error = %e, "intent failed");
        Response::Error(e.to_string())
    })
}
