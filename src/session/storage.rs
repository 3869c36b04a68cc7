//! Persisted key-value storage for the session blob.
//!
//! The file store keeps a JSON object in a single file:
//! ~/.local/share/civiclink/session.json

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn read(&self, key: &str) -> ClientResult<Option<String>>;
    async fn write(&self, key: &str, value: &str) -> ClientResult<()>;
    async fn remove(&self, key: &str) -> ClientResult<()>;
}

// =============================================================================
// File-backed storage
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

fn storage_error(path: &Path, e: impl std::fmt::Display) -> ClientError {
    ClientError::Storage(format!("{}: {}", path.display(), e))
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole map under a shared lock. Missing or empty file is an empty map.
    fn read_map(path: &Path) -> ClientResult<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let file = File::open(path).map_err(|e| storage_error(path, e))?;
        file.lock_shared().map_err(|e| storage_error(path, e))?;

        let mut content = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut content);
        file.unlock().map_err(|e| storage_error(path, e))?;
        read.map_err(|e| storage_error(path, e))?;

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&content).map_err(|e| storage_error(path, e))
    }

    /// Read-modify-write under an exclusive lock.
    fn update_map(path: &Path, update: impl FnOnce(&mut HashMap<String, String>)) -> ClientResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_error(path, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| storage_error(path, e))?;
        file.lock_exclusive().map_err(|e| storage_error(path, e))?;

        let result = (|| -> std::io::Result<()> {
            let mut content = String::new();
            file.read_to_string(&mut content)?;

            // A corrupt file is replaced rather than blocking every future login.
            let mut map: HashMap<String, String> = serde_json::from_str(&content).unwrap_or_default();
            update(&mut map);

            let serialized = serde_json::to_string_pretty(&map)?;
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(serialized.as_bytes())?;
            file.flush()
        })();

        file.unlock().map_err(|e| storage_error(path, e))?;
        result.map_err(|e| storage_error(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .map_err(|e| storage_error(path, e))?;
        }

        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> ClientResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> ClientResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| ClientError::Storage(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn read(&self, key: &str) -> ClientResult<Option<String>> {
        let key = key.to_string();
        self.blocking(move |path| Ok(Self::read_map(path)?.remove(&key)))
            .await
    }

    async fn write(&self, key: &str, value: &str) -> ClientResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.blocking(move |path| {
            Self::update_map(path, |map| {
                map.insert(key, value);
            })
        })
        .await
    }

    async fn remove(&self, key: &str) -> ClientResult<()> {
        let key = key.to_string();
        self.blocking(move |path| {
            if !path.exists() {
                return Ok(());
            }
            Self::update_map(path, |map| {
                map.remove(&key);
            })
        })
        .await
    }
}

// =============================================================================
// In-memory storage
// =============================================================================

/// Process-local storage. Counts mutations so callers can tell whether
/// anything was written.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    mutations: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with one entry, without counting it as a mutation.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        storage
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of writes and removals performed so far.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn read(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.get(key))
    }

    async fn write(&self, key: &str, value: &str) -> ClientResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> ClientResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
