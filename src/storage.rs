// ============================================================================
// Key-value storage — the canvas's durable persistence collaborator
// ============================================================================
//
// The canvas and the shell never touch the filesystem directly; they talk to
// a `Storage` handle injected at construction. The production implementation
// is a small JSON string map written through to a file in the app data
// directory. Tests and the headless CLI use the in-memory variant.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Fixed key for the serialized canvas snapshot.
pub const CANVAS_KEY: &str = "canvas";
/// Fixed key for the persisted shell state (tool, colors, grid size).
pub const STATE_KEY: &str = "state";

/// Error type for storage writes.
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::Serialize(e) => write!(f, "serialization error: {}", e),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialize(e)
    }
}

/// String key-value store. `set` overwrites any prior value under the key.
///
/// Write failures must surface through the `Result`; callers decide whether
/// they are fatal (for snapshot persistence they are logged and painting
/// continues).
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

// ============================================================================
// FileStore — JSON map persisted in the app data directory
// ============================================================================

struct FileStoreInner {
    path: PathBuf,
    entries: HashMap<String, String>,
}

/// Durable store backed by a single JSON file, written through on every
/// `set`. Cloning yields another handle onto the same map, so the canvas
/// and the shell can both hold one.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Mutex<FileStoreInner>>,
}

impl FileStore {
    /// Open the store at its default location (`<data dir>/storage.json`).
    pub fn open_default() -> Self {
        Self::open(crate::logger::app_data_dir().join("storage.json"))
    }

    /// Open a store file, loading any existing entries. A missing file is an
    /// empty store; an unreadable or corrupt file is logged and treated as
    /// empty rather than aborting startup.
    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    log_warn!("storage file {} is corrupt: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            inner: Arc::new(Mutex::new(FileStoreInner { path, entries })),
        }
    }
}

impl FileStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, FileStoreInner> {
        // A panic mid-write can poison the lock; the map itself is still
        // usable, so recover rather than propagate.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Storage for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        inner.entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = inner.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&inner.entries)?;
        fs::write(&inner.path, json)?;
        Ok(())
    }
}

// ============================================================================
// MemoryStore — volatile map for tests and headless runs
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
