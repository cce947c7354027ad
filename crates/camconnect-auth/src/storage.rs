//! Persistent key/value storage for session and lockout state
//!
//! Uses a JSON object file in ~/.config/camconnect/session.json by default.
//! Unreadable content is treated as absent so corruption can only ever force
//! a fresh login, never extend trust in a stale session.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Keys of the persisted authentication state
pub mod keys {
    pub const SESSION_TOKEN: &str = "session_token";
    pub const LAST_AUTH_TIME: &str = "last_auth_time";
    pub const PIN_ATTEMPTS: &str = "pin_attempts";
    pub const LOCKOUT_START_TIME: &str = "lockout_start_time";
    pub const LOCKOUT_SEQUENCE_COUNT: &str = "lockout_sequence_count";
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A batch of puts and removes committed together
#[derive(Debug, Clone, Default)]
pub struct StoreEdit {
    ops: Vec<(String, Option<Value>)>,
}

impl StoreEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.ops.push((key.to_string(), Some(value.into())));
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.ops.push((key.to_string(), None));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn apply_to(self, map: &mut HashMap<String, Value>) {
        for (key, value) in self.ops {
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
    }
}

/// Durable key/value storage surviving process restarts
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value
    async fn get(&self, key: &str) -> Option<Value>;

    /// Commit a batch of changes; later edits win
    async fn apply(&self, edit: StoreEdit) -> StorageResult<()>;

    /// Read an integer, treating a value of any other type as absent
    async fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key).await? {
            Value::Number(n) if n.is_i64() => n.as_i64(),
            _ => {
                warn!("Ignoring unreadable value for {}", key);
                None
            }
        }
    }

    /// Read a string, treating a value of any other type as absent
    async fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key).await? {
            Value::String(s) => Some(s),
            _ => {
                warn!("Ignoring unreadable value for {}", key);
                None
            }
        }
    }
}

/// Key/value store backed by a JSON file
pub struct FileStore {
    /// Path to the storage file
    path: PathBuf,
    /// In-memory copy of the file contents
    data: RwLock<HashMap<String, Value>>,
}

impl FileStore {
    /// Open storage at a specific path
    ///
    /// Loads existing data from disk if present.
    pub async fn with_path(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(data) => {
                    info!("Loaded session state from {:?}", path);
                    data
                }
                Err(e) => {
                    warn!("Failed to parse session state, starting fresh: {}", e);
                    HashMap::new()
                }
            }
        } else {
            debug!("No existing session state, creating new");
            HashMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Write the current contents to disk via a temporary file
    fn save(&self, data: &HashMap<String, Value>) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved session state to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let data = self.data.read().await;
        data.get(key).cloned()
    }

    async fn apply(&self, edit: StoreEdit) -> StorageResult<()> {
        if edit.is_empty() {
            return Ok(());
        }
        // Memory is updated first; a failed write only loses durability.
        let mut data = self.data.write().await;
        edit.apply_to(&mut data);
        self.save(&data)
    }
}

/// Non-durable store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.data.read().await.get(key).cloned()
    }

    async fn apply(&self, edit: StoreEdit) -> StorageResult<()> {
        edit.apply_to(&mut *self.data.write().await);
        Ok(())
    }
}
