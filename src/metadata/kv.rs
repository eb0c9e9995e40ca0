//! Key-Value Cache Backends
//!
//! The metadata store only needs `get`/`set` of JSON strings by key. Two backends
//! are provided: an in-memory map for tests and single-process runs, and a
//! directory of JSON files that survives restarts and can be opened by several
//! processes on the same host (coordinator, repair loop).

use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{DfsError, DfsResult};

pub trait KvStore: Send + Sync {
    /// Returns the raw JSON stored under `key`, or `None` if the key was never set.
    fn get(&self, key: &str) -> DfsResult<Option<String>>;

    /// Replaces the value under `key`.
    fn set(&self, key: &str, value: String) -> DfsResult<()>;
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> DfsResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: String) -> DfsResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One `<key>.json` file per key under `root`.
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    pub fn open(root: impl AsRef<Path>) -> DfsResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        tracing::debug!("Opened file-backed metadata cache at {:?}", root);
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> DfsResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DfsError::Store(format!("invalid cache key {:?}", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> DfsResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: String) -> DfsResult<()> {
        let path = self.path_for(key)?;
        // Readers never observe a partially written value.
        let tmp = self.root.join(format!(
            ".{}.{}.{}.tmp",
            key,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
