//! File-based cache backend — persistent JSON-lines storage.
//!
//! One JSONL file per partition inside the cache directory:
//! `llm.jsonl` for raw model responses and `actions.jsonl` for resolved
//! browser commands. Each line is a JSON-encoded `CacheEntry`.
//!
//! Storage location: `~/.stepwright/cache/`

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stepwright_core::cache::{CacheEntry, CacheEntryMeta, CacheKind, CacheStore};
use stepwright_core::error::CacheError;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed cache store.
///
/// Every partition is loaded into memory on creation and flushed to disk on
/// every mutation (put, remove, clear). Fast reads, durable writes.
pub struct FileBackend {
    dir: PathBuf,
    partitions: Arc<RwLock<HashMap<CacheKind, Vec<CacheEntry>>>>,
}

impl FileBackend {
    /// Open the cache directory, loading whatever partitions already exist.
    /// The directory is created on first write.
    pub fn new(dir: PathBuf) -> Self {
        let mut partitions = HashMap::new();
        for kind in CacheKind::ALL {
            let entries = Self::load_from_disk(&Self::partition_path(&dir, kind));
            debug!(dir = %dir.display(), kind = %kind, count = entries.len(), "File cache partition loaded");
            partitions.insert(kind, entries);
        }
        Self {
            dir,
            partitions: Arc::new(RwLock::new(partitions)),
        }
    }

    /// Default directory: `~/.stepwright/cache`
    pub fn default_dir() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".stepwright").join("cache")
    }

    fn partition_path(dir: &Path, kind: CacheKind) -> PathBuf {
        dir.join(format!("{}.jsonl", kind.as_str()))
    }

    fn load_from_disk(path: &Path) -> Vec<CacheEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // Not written yet
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<CacheEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Skipping corrupted cache entry");
                    None
                }
            })
            .collect()
    }

    /// Rewrite one partition file from memory.
    fn flush(&self, kind: CacheKind, entries: &[CacheEntry]) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CacheError::Storage(format!("Failed to create cache directory: {e}")))?;

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry)
                .map_err(|e| CacheError::Serialization(format!("Failed to serialize cache entry: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(Self::partition_path(&self.dir, kind), &content)
            .map_err(|e| CacheError::Storage(format!("Failed to write cache file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl CacheStore for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(&kind)
            .and_then(|entries| entries.iter().find(|e| e.key == key).cloned()))
    }

    async fn put(&self, kind: CacheKind, entry: CacheEntry) -> Result<(), CacheError> {
        let mut partitions = self.partitions.write().await;
        let entries = partitions.entry(kind).or_default();
        entries.retain(|e| e.key != entry.key);
        entries.push(entry);
        self.flush(kind, entries)
    }

    async fn remove(&self, kind: CacheKind, keys: &[String]) -> Result<usize, CacheError> {
        let mut partitions = self.partitions.write().await;
        let Some(entries) = partitions.get_mut(&kind) else {
            return Ok(0);
        };
        let len_before = entries.len();
        entries.retain(|e| !keys.contains(&e.key));
        let removed = len_before - entries.len();
        if removed > 0 {
            self.flush(kind, entries)?;
        }
        Ok(removed)
    }

    async fn list(&self, kind: CacheKind) -> Result<Vec<CacheEntryMeta>, CacheError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(&kind)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| CacheEntryMeta {
                        key: e.key.clone(),
                        created_at: e.created_at,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, kind: CacheKind) -> Result<usize, CacheError> {
        Ok(self.partitions.read().await.get(&kind).map_or(0, Vec::len))
    }

    async fn clear(&self, kind: CacheKind) -> Result<(), CacheError> {
        let mut partitions = self.partitions.write().await;
        partitions.insert(kind, Vec::new());
        self.flush(kind, &[])
    }
}
