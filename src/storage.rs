//! Key-value persistence layer.
//!
//! The store keeps its whole collection under a single named slot. Two
//! backends are provided:
//!
//! ```text
//! FileStorage     <data-dir>/<slot>.json      # pretty JSON, atomic replace
//!                 <data-dir>/<slot>.lock      # fs2 advisory lock
//! MemoryStorage   shared in-process map       # tests and embedding
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// A slot-addressed JSON store.
pub trait KeyValueStore: Send + 'static {
    /// Read a slot. A slot that was never written reads as `None`.
    fn read(&self, key: &str) -> Result<Option<Value>>;

    /// Replace a slot's contents.
    fn write(&self, key: &str, value: &Value) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        (**self).write(key, value)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "invalid storage slot '{key}' (use letters, digits, '-' or '_')"
        )))
    }
}

/// Directory-backed storage: one JSON file per slot.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStorage {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        match lock::read_locked(&path, self.lock_timeout_ms)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        validate_key(key)?;
        let json = serde_json::to_vec_pretty(value)?;
        lock::write_atomic_locked(self.slot_path(key), &json, self.lock_timeout_ms)
    }
}

/// In-memory storage. Clones share the same slots, so a test can keep a
/// handle while the store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one slot.
    pub fn with_slot(key: impl Into<String>, value: Value) -> Self {
        let storage = Self::new();
        storage.slots().insert(key.into(), value);
        storage
    }

    /// Current contents of a slot.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.slots().get(key).cloned()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        validate_key(key)?;
        self.slots().insert(key.to_string(), value.clone());
        Ok(())
    }
}
