use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, error, trace};

use crate::domain::ViewerError;

pub const THEME_KEY: &str = "isDarkMode";
pub const HISTORY_KEY: &str = "queryHistory";
pub const BOOKMARKS_KEY: &str = "bookmarkedQueries";
pub const HISTORY_LIMIT: usize = 10;

/// Key value store for json encoded values.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, ViewerError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), ViewerError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ViewerError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ViewerError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Stores all keys in a single json object file that is rewritten on each set.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: Map<String, JsonValue>,
}

impl FileStorage {
    pub fn open(path: PathBuf) -> Result<Self, ViewerError> {
        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Map::new(),
            Ok(content) => match serde_json::from_str::<JsonValue>(&content) {
                Ok(JsonValue::Object(map)) => map,
                Ok(_) | Err(_) => {
                    error!("Ignoring unreadable state file {}", path.display());
                    Map::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened state file {} with {} keys", path.display(), values.len());
        Ok(Self { path, values })
    }

    fn flush(&self) -> Result<(), ViewerError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ViewerError> {
        Ok(self.values.get(key).map(|v| v.to_string()))
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ViewerError> {
        let json: JsonValue = serde_json::from_str(&value)?;
        self.values.insert(key.to_string(), json);
        self.flush()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub label: String,
    pub timestamp: String,
}

impl SavedQuery {
    pub fn now(label: &str) -> Self {
        Self {
            label: label.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Theme, history and bookmarks. Read once at startup and written back in full
/// after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub dark_mode: bool,
    pub history: Vec<SavedQuery>,
    pub bookmarks: Vec<SavedQuery>,
}

impl Preferences {
    pub fn load(storage: &dyn Storage) -> Self {
        Self {
            dark_mode: Self::read(storage, THEME_KEY).unwrap_or(false),
            history: Self::read(storage, HISTORY_KEY).unwrap_or_default(),
            bookmarks: Self::read(storage, BOOKMARKS_KEY).unwrap_or_default(),
        }
    }

    fn read<T: for<'de> Deserialize<'de>>(storage: &dyn Storage, key: &str) -> Option<T> {
        let raw = match storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Reading {key} failed: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Ignoring stored {key}: {e}");
                None
            }
        }
    }

    pub fn save(&self, storage: &mut dyn Storage) -> Result<(), ViewerError> {
        storage.set(THEME_KEY, serde_json::to_string(&self.dark_mode)?)?;
        storage.set(HISTORY_KEY, serde_json::to_string(&self.history)?)?;
        storage.set(BOOKMARKS_KEY, serde_json::to_string(&self.bookmarks)?)?;
        trace!(
            "Saved preferences: {} history, {} bookmarks",
            self.history.len(),
            self.bookmarks.len()
        );
        Ok(())
    }

    /// Puts a query in front of the history unless it is already recorded.
    pub fn record_history(&mut self, label: &str) -> bool {
        if self.history.iter().any(|q| q.label == label) {
            return false;
        }
        self.history.insert(0, SavedQuery::now(label));
        self.history.truncate(HISTORY_LIMIT);
        true
    }

    pub fn add_bookmark(&mut self, label: &str) -> bool {
        if self.bookmarks.iter().any(|q| q.label == label) {
            return false;
        }
        self.bookmarks.push(SavedQuery::now(label));
        true
    }

    pub fn remove_bookmark(&mut self, label: &str) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|q| q.label != label);
        before != self.bookmarks.len()
    }

    pub fn toggle_theme(&mut self) {
        self.dark_mode = !self.dark_mode;
    }
}
