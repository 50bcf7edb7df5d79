use crate::scheduler::WakePolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use posture_ipc::SOCKET_PATH;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Daemon settings read from `posture.toml`. These tune the host side of
/// the scheduler; user preferences live in the settings store instead.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// How often the alarm registry is polled for due alarms.
    pub tick_ms: u64,
    /// Period of the keep-alive wake that runs the self-heal check.
    pub keep_alive_secs: u64,
    /// A reminder this far past due is treated as lost and re-armed.
    pub stale_after_secs: u64,
    pub socket_path: String,
    pub data_dir: Option<PathBuf>,
    pub catalog_dir: Option<PathBuf>,
    /// Filter used when RUST_LOG is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            keep_alive_secs: 30,
            stale_after_secs: 120,
            socket_path: SOCKET_PATH.to_string(),
            data_dir: None,
            catalog_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn wake_policy(&self) -> WakePolicy {
        WakePolicy {
            keep_alive_ms: (self.keep_alive_secs.max(1) * 1_000) as i64,
            stale_after_ms: (self.stale_after_secs * 1_000) as i64,
        }
    }

    pub fn tick(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_ms.max(50))
    }
}

pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => ProjectDirs::from("com", "posture", "posture")
            .map(|dirs| dirs.config_dir().join("posture.toml")),
    };
    match path {
        Some(path) if path.exists() => {
            let config_str = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file at {:?}", path))?;
            toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file at {:?}", path))
        }
        _ => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("posture.toml");
        fs::write(&path, "keep_alive_secs = 5\nsocket_path = \"/tmp/test.sock\"\n").expect("write");
        let config = load_config(Some(&path)).expect("config");
        assert_eq!(config.keep_alive_secs, 5);
        assert_eq!(config.socket_path, "/tmp/test.sock");
        assert_eq!(config.stale_after_secs, 120);
        assert_eq!(
            config.wake_policy(),
            WakePolicy {
                keep_alive_ms: 5_000,
                stale_after_ms: 120_000
            }
        );
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(Some(&dir.path().join("absent.toml"))).expect("config");
        assert_eq!(config, Config::default());
        assert_eq!(config.wake_policy(), WakePolicy::default());
    }

    #[test]
    fn bad_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("posture.toml");
        fs::write(&path, "tick_ms = \"fast\"").expect("write");
        assert!(load_config(Some(&path)).is_err());
    }
}
