//! Key-value namespaces backing the daemon's durable state.
//!
//! Nothing here caches: every read goes to the backing file so that a
//! restarted daemon sees exactly what the previous one wrote.

use directories::ProjectDirs;
use posture_ipc::Settings;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

const SETTINGS_KEY: &str = "settings";
const PAUSED_TIME_LEFT_KEY: &str = "pausedTimeLeft";
const LAST_ACTIVE_KEY: &str = "lastActiveTimestamp";
const LAST_STRETCH_KEY: &str = "lastStretchRequest";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A flat JSON object of named values.
pub trait Namespace: Send {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    fn entries(&self) -> Result<Map<String, Value>, StoreError>;
}

/// Namespace stored as one JSON file, rewritten through a temp file.
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> Result<Map<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let json = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        if json.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&json) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "corrupt store file, starting empty");
                Ok(Map::new())
            }
        }
    }

    fn write(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

impl Namespace for JsonFile {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read()?.remove(key))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut map = self.read()?;
        map.insert(key.to_string(), value);
        self.write(&map)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let mut map = self.read()?;
        if map.remove(key).is_some() {
            self.write(&map)?;
        }
        Ok(())
    }

    fn entries(&self) -> Result<Map<String, Value>, StoreError> {
        self.read()
    }
}

/// In-process namespace. Clones share the same entries, and `set_broken`
/// makes every operation fail, which is how tests simulate I/O failure.
#[derive(Clone, Default)]
pub struct InMemory {
    entries: Arc<Mutex<Map<String, Value>>>,
    broken: Arc<Mutex<bool>>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_broken(&self, broken: bool) {
        *self.broken.lock().unwrap_or_else(PoisonError::into_inner) = broken;
    }

    fn check(&self) -> Result<(), StoreError> {
        if *self.broken.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(StoreError::Unavailable("in-memory store marked broken".into()));
        }
        Ok(())
    }

    fn map(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Namespace for InMemory {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self.map().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check()?;
        self.map().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.map().remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<Map<String, Value>, StoreError> {
        self.check()?;
        Ok(self.map().clone())
    }
}

/// Default data directory, e.g. `~/.local/share/posture`.
pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "posture", "posture")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// Typed access to the synced (settings) and local (diagnostics) namespaces.
pub struct Storage {
    sync: Box<dyn Namespace>,
    local: Box<dyn Namespace>,
}

impl Storage {
    pub fn new(sync: Box<dyn Namespace>, local: Box<dyn Namespace>) -> Self {
        Self { sync, local }
    }

    pub fn open(data_dir: &Path) -> Self {
        Self::new(
            Box::new(JsonFile::new(data_dir.join("sync.json"))),
            Box::new(JsonFile::new(data_dir.join("local.json"))),
        )
    }

    /// Missing settings, or a record that is not an object, read as
    /// defaults. Wrong-typed fields fall back individually.
    pub fn settings(&self) -> Result<Settings, StoreError> {
        let Some(value) = self.sync.get(SETTINGS_KEY)? else {
            return Ok(Settings::default());
        };
        match serde_json::from_value::<Settings>(value) {
            Ok(settings) => Ok(settings.normalized()),
            Err(e) => {
                warn!(error = %e, "malformed settings record, using defaults");
                Ok(Settings::default())
            }
        }
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        let value = serde_json::to_value(settings.clone().normalized())?;
        self.sync.set(SETTINGS_KEY, value)
    }

    pub fn paused_time_left(&self) -> Result<Option<u64>, StoreError> {
        Ok(self
            .sync
            .get(PAUSED_TIME_LEFT_KEY)?
            .and_then(|v| v.as_f64())
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| ms as u64))
    }

    pub fn set_paused_time_left(&mut self, ms: u64) -> Result<(), StoreError> {
        self.sync.set(PAUSED_TIME_LEFT_KEY, Value::from(ms))
    }

    pub fn clear_paused_time_left(&mut self) -> Result<(), StoreError> {
        self.sync.remove(PAUSED_TIME_LEFT_KEY)
    }

    pub fn touch(&mut self, now_ms: i64) -> Result<(), StoreError> {
        self.local.set(LAST_ACTIVE_KEY, Value::from(now_ms))
    }

    pub fn last_active(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.local.get(LAST_ACTIVE_KEY)?.and_then(|v| v.as_i64()))
    }

    pub fn record_stretch_request(&mut self, now_ms: i64, title: &str) -> Result<(), StoreError> {
        self.local.set(
            LAST_STRETCH_KEY,
            serde_json::json!({ "at": now_ms, "exercise": title }),
        )
    }
}
