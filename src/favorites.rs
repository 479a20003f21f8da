use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::MovieId;

pub const FAVORITES_SLOT: &str = "cinetren_favorites";
const DEFAULT_FAVORITES_PATH: &str = "data/favorites.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// The whole file is rewritten on every write; last writer wins.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_env() -> Self {
        let path = env::var("FAVORITES_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FAVORITES_PATH.to_string());
        Self::new(path)
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        // A corrupt file is replaced rather than blocking every future write.
        let mut items = self.read_all().unwrap_or_else(|e| {
            warn!("Discarding unreadable storage file {:?}: {}", self.path, e);
            BTreeMap::new()
        });
        items.insert(key.to_string(), value.to_string());
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&items)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Persisted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggled {
    pub favorites: Vec<MovieId>,
    pub now_favorite: bool,
    pub sync: SyncStatus,
}

pub trait FavoritesStore: Send + Sync {
    fn favorites(&self) -> Vec<MovieId>;
    fn is_favorite(&self, id: &MovieId) -> bool;
    fn toggle(&self, id: &MovieId) -> Toggled;
}

pub struct LocalFavorites<S> {
    storage: S,
    toggle_lock: Mutex<()>,
}

impl<S: KeyValueStorage> LocalFavorites<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            toggle_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn save(&self, list: &[MovieId]) -> SyncStatus {
        let encoded = match serde_json::to_string(list) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to encode favorites: {}", e);
                return SyncStatus::Failed;
            }
        };
        match self.storage.set_item(FAVORITES_SLOT, &encoded) {
            Ok(()) => SyncStatus::Persisted,
            Err(e) => {
                error!("Failed to save favorites: {}", e);
                SyncStatus::Failed
            }
        }
    }
}

impl<S: KeyValueStorage> FavoritesStore for LocalFavorites<S> {
    fn favorites(&self) -> Vec<MovieId> {
        match self.storage.get_item(FAVORITES_SLOT) {
            Ok(Some(raw)) => decode_favorites(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Failed to read favorites: {}", e);
                Vec::new()
            }
        }
    }

    fn is_favorite(&self, id: &MovieId) -> bool {
        self.favorites().contains(id)
    }

    fn toggle(&self, id: &MovieId) -> Toggled {
        // Held across the read and the write.
        let _guard = self
            .toggle_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut favorites = self.favorites();
        let now_favorite = match favorites.iter().position(|f| f == id) {
            Some(index) => {
                favorites.remove(index);
                false
            }
            None => {
                favorites.push(id.clone());
                true
            }
        };
        debug!(id = %id, now_favorite, "Toggled favorite");
        let sync = self.save(&favorites);
        Toggled {
            favorites,
            now_favorite,
            sync,
        }
    }
}

pub fn decode_favorites(raw: &str) -> Vec<MovieId> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(MovieId::from(s)),
                Value::Number(n) => Some(MovieId::normalize(n)),
                _ => None,
            })
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            error!("Error reading favorites: {}", e);
            Vec::new()
        }
    }
}
