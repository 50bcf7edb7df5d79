use anyhow::{bail, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use posture_ipc::{send_command, Ack, Command, Language, Response, Settings, TimerState, SOCKET_PATH};

mod config;
mod popup;
mod ui;

#[derive(Parser)]
#[command(name = "posturectl")]
#[command(about = "Control the posture reminder", long_about = None)]
struct Cli {
    /// Socket of the running daemon
    #[arg(long, global = true, default_value = SOCKET_PATH)]
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the reminder cycle
    Start,
    /// Stop the reminder cycle
    Stop,
    /// Pause the countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Restart the countdown at the configured interval
    Reset,
    /// Next reminder after a short delay, then the usual interval
    Snooze {
        #[arg(short, long, default_value_t = 5.0)]
        minutes: f64,
    },
    /// Show timer status
    Status,
    /// Change settings
    Set(SetArgs),
    /// List exercises for the current language
    Exercises,
    /// Interactive countdown and settings
    Popup,
}

#[derive(clap::Args)]
struct SetArgs {
    /// Minutes between reminders (1-180)
    #[arg(short, long)]
    interval: Option<u32>,
    #[arg(long)]
    notifications: Option<bool>,
    #[arg(long)]
    exercises: Option<bool>,
    /// en or ko
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    work_hours_only: Option<bool>,
    /// HH:MM
    #[arg(long)]
    work_start: Option<String>,
    /// HH:MM, earlier than the start for overnight windows
    #[arg(long)]
    work_end: Option<String>,
    /// Enable or disable a category, e.g. --category neck=off
    #[arg(long = "category", value_parser = parse_category)]
    categories: Vec<(String, bool)>,
}

fn parse_category(s: &str) -> Result<(String, bool), String> {
    let (name, state) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=on|off, got {s:?}"))?;
    let enabled = match state {
        "on" | "true" | "1" => true,
        "off" | "false" | "0" => false,
        other => return Err(format!("unknown state {other:?}")),
    };
    Ok((name.trim().to_string(), enabled))
}

impl SetArgs {
    fn apply(self, mut settings: Settings) -> Result<Settings> {
        if let Some(interval) = self.interval {
            settings.interval_minutes = interval;
        }
        if let Some(on) = self.notifications {
            settings.notifications_enabled = on;
        }
        if let Some(on) = self.exercises {
            settings.exercises_enabled = on;
        }
        if let Some(code) = self.language {
            settings.language = Language::from_code(&code);
        }
        if let Some(on) = self.work_hours_only {
            settings.work_hours_only = on;
        }
        for (value, slot) in [
            (self.work_start, &mut settings.work_start),
            (self.work_end, &mut settings.work_end),
        ] {
            if let Some(value) = value {
                if posture_ipc::parse_hhmm(&value).is_none() {
                    bail!("invalid time {value:?}, expected HH:MM");
                }
                *slot = value;
            }
        }
        for (name, enabled) in self.categories {
            settings.categories.insert(name, enabled);
        }
        Ok(settings.normalized())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let socket = cli.socket;

    let command = match cli.command {
        Commands::Popup => {
            let config = config::load_config()?;
            return popup::run(socket, config).await;
        }
        Commands::Set(args) => {
            let current = match send_command(&socket, &Command::GetSettings).await? {
                Response::Settings(settings) => settings,
                other => bail!("unexpected response: {other:?}"),
            };
            Command::UpdateSettings(args.apply(current)?)
        }
        Commands::Start => Command::StartTimer,
        Commands::Stop => Command::StopTimer,
        Commands::Pause => Command::Pause,
        Commands::Resume => Command::Resume,
        Commands::Reset => Command::ResetAlarm,
        Commands::Snooze { minutes } => Command::ResumeAlarm {
            delay_minutes: minutes,
        },
        Commands::Status => Command::Status,
        Commands::Exercises => Command::GetExercises,
    };

    match send_command(&socket, &command).await? {
        Response::Ack(ack) => print_ack(&ack),
        Response::Status(status) => {
            println!("State: {:?}", status.state);
            println!("Interval: {} min", status.interval_minutes);
            match status.state {
                TimerState::Running => {
                    if let Some(next) = status.next_fire {
                        println!("Next reminder: {}", clock(next));
                    }
                }
                TimerState::Paused => {
                    let left = status.paused_remaining_ms.unwrap_or(0) / 1000;
                    println!("Remaining: {:02}:{:02}", left / 60, left % 60);
                }
                TimerState::Stopped => {}
            }
            if status.healed {
                println!("(schedule was missing and has been restored)");
            }
        }
        Response::Settings(settings) => println!("{}", serde_json::to_string_pretty(&settings)?),
        Response::Exercises(exercises) => {
            for ex in exercises {
                println!("[{}] {}: {}", ex.category, ex.title, ex.description);
            }
        }
        Response::Error(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_ack(ack: &Ack) {
    let mut line = format!("{}: {}", if ack.success { "OK" } else { "Rejected" }, ack.message);
    if let Some(next) = ack.next_fire {
        line.push_str(&format!(" (next reminder at {})", clock(next)));
    }
    if ack.success {
        println!("{line}");
    } else {
        eprintln!("{line}");
    }
}

pub(crate) fn clock(epoch_ms: i64) -> String {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> SetArgs {
        let mut full = vec!["posturectl", "set"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Set(args) => args,
            _ => panic!("not a set command"),
        }
    }

    #[test]
    fn set_applies_only_given_fields() {
        let settings = args(&["--interval", "500", "--language", "ko", "--category", "back=off"])
            .apply(Settings::default())
            .expect("apply");
        assert_eq!(settings.interval_minutes, 180);
        assert_eq!(settings.language, Language::Ko);
        assert!(!settings.category_enabled("back"));
        assert!(settings.category_enabled("neck"));
        assert!(settings.notifications_enabled);
    }

    #[test]
    fn set_rejects_bad_times() {
        assert!(args(&["--work-start", "25:00"]).apply(Settings::default()).is_err());
        let settings = args(&["--work-start", "22:00", "--work-end", "06:00"])
            .apply(Settings::default())
            .expect("apply");
        assert_eq!(settings.work_hours().start, 22 * 60);
    }

    #[test]
    fn category_flag_syntax() {
        assert_eq!(parse_category("eye=on"), Ok(("eye".to_string(), true)));
        assert!(parse_category("eye").is_err());
        assert!(parse_category("eye=maybe").is_err());
    }
}
