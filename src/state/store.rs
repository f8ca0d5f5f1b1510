//! Global state and its persistence.
//!
//! The whole application state is one [`Value`] behind a lock. Callbacks on
//! worker threads write it; observers on the UI thread read snapshots of it.
//! After every update pass the full tree is written to a key-value
//! [`Preferences`] store as one JSON blob, with the transient `cache` field
//! emptied.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::Value;

// =============================================================================
// Preferences
// =============================================================================

/// Key-value string storage the state blob is persisted in.
pub trait Preferences: Send {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> io::Result<()>;
}

/// In-memory preferences. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let prefs = Self::default();
        prefs.entries.lock().insert(key.to_string(), value.to_string());
        prefs
    }

    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entry(key))
    }

    fn put(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    base_path: PathBuf,
}

impl FilePreferences {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

impl Preferences for FilePreferences {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.base_path)?;
        fs::write(self.path(key), value)
    }
}

// =============================================================================
// Store
// =============================================================================

/// The global application state plus where it is persisted.
pub struct Store {
    state: RwLock<Value>,
    prefs: Mutex<Box<dyn Preferences>>,
    key: String,
}

impl Store {
    pub fn new(initial: Value, prefs: impl Preferences + 'static, key: &str) -> Self {
        Self {
            state: RwLock::new(initial),
            prefs: Mutex::new(Box::new(prefs)),
            key: key.to_string(),
        }
    }

    /// Seed from the persisted blob, falling back to `default` when there is
    /// none or it cannot be read or parsed.
    pub fn load(default: Value, prefs: impl Preferences + 'static, key: &str) -> Self {
        let seeded = match prefs.get(key) {
            Ok(Some(blob)) => match serde_json::from_str::<Value>(&blob) {
                Ok(state) => {
                    debug!(key, "seeded state from preferences");
                    state
                }
                Err(err) => {
                    warn!(key, %err, "persisted state is invalid; using default");
                    default
                }
            },
            Ok(None) => default,
            Err(err) => {
                warn!(key, %err, "persisted state unreadable; using default");
                default
            }
        };
        Self::new(seeded, prefs, key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Value {
        self.state.read().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.state.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.state.write())
    }

    /// Run `f` on a copy of the state with no lock held, then commit the
    /// copy. Concurrent updates are last-writer-wins.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut draft = self.snapshot();
        let result = f(&mut draft);
        *self.state.write() = draft;
        result
    }

    /// Write the current state to preferences.
    pub fn persist(&self) -> Result<()> {
        let blob = {
            let state = self.state.read();
            serde_json::to_string(&persisted_view(&state))?
        };
        self.prefs.lock().put(&self.key, &blob)?;
        Ok(())
    }

    /// The blob currently stored, if any.
    pub fn stored(&self) -> Result<Option<String>> {
        Ok(self.prefs.lock().get(&self.key)?)
    }
}

/// What gets persisted: the state with `cache` replaced by an empty map.
pub fn persisted_view(state: &Value) -> Value {
    let mut view = state.clone();
    if view.as_map().is_some() {
        view.set("cache", Value::empty_map());
    }
    view
}
