use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod alarms;
mod catalog;
mod config;
mod i18n;
mod ipc;
mod notify;
mod persistence;
mod scheduler;

use alarms::Alarms;
use catalog::Catalog;
use notify::{DesktopPresenter, NotificationAction};
use persistence::Storage;
use scheduler::{Scheduler, SNOOZE_MINUTES};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional first argument: path to a config file.
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let data_dir = match &config.data_dir {
        Some(dir) => dir.clone(),
        None => persistence::default_data_dir()?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
    info!(data_dir = %data_dir.display(), "posture daemon starting");

    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    let mut scheduler = Scheduler::new(
        Storage::open(&data_dir),
        Alarms::open(&data_dir),
        Catalog::new(config.catalog_dir.clone()),
        Box::new(DesktopPresenter::new(action_tx)),
        config.wake_policy(),
    );
    if let Err(e) = scheduler.init(Local::now()) {
        warn!(error = %e, "initial schedule check failed, retrying on next tick");
    }
    let scheduler = Arc::new(Mutex::new(scheduler));

    let server = tokio::spawn(ipc::server::start(config.socket_path.clone(), scheduler.clone()));

    let mut ticker = tokio::time::interval(config.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut scheduler = scheduler.lock().await;
                if let Err(e) = scheduler.tick(Local::now()) {
                    error!(error = %e, "alarm check failed");
                }
            }
            Some(action) = action_rx.recv() => {
                handle_action(&scheduler, action).await;
            }
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    server.abort();
    let _ = std::fs::remove_file(&config.socket_path);
    Ok(())
}

async fn handle_action(scheduler: &Arc<Mutex<Scheduler>>, action: NotificationAction) {
    let mut scheduler = scheduler.lock().await;
    let now = Local::now();
    match action {
        NotificationAction::Snooze => match scheduler.resume_alarm(SNOOZE_MINUTES, now) {
            Ok(ack) => info!(next_fire = ?ack.next_fire, "snoozed"),
            Err(e) => error!(error = %e, "snooze failed"),
        },
        NotificationAction::StretchNow(exercise) => {
            if let Err(e) = scheduler.stretch_now(&exercise, now) {
                error!(error = %e, "stretch request failed");
            }
        }
    }
}
