//! In-memory backend — useful for testing and runs where persistence isn't needed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use stepwright_core::cache::{CacheEntry, CacheEntryMeta, CacheKind, CacheStore};
use stepwright_core::error::CacheError;
use tokio::sync::RwLock;

/// An in-memory store keeping each partition in insertion order.
pub struct InMemoryBackend {
    partitions: Arc<RwLock<HashMap<CacheKind, Vec<CacheEntry>>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryBackend {
    fn name(&self) -> &str { "memory" }

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
        Ok(())
    }

    async fn remove(&self, kind: CacheKind, keys: &[String]) -> Result<usize, CacheError> {
        let mut partitions = self.partitions.write().await;
        let Some(entries) = partitions.get_mut(&kind) else {
            return Ok(0);
        };
        let len_before = entries.len();
        entries.retain(|e| !keys.contains(&e.key));
        Ok(len_before - entries.len())
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
        self.partitions.write().await.remove(&kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryBackend::new();
        store
            .put(CacheKind::Llm, CacheEntry::new("k1", json!({"content": "hi"})))
            .await
            .unwrap();

        let entry = store.get(CacheKind::Llm, "k1").await.unwrap().unwrap();
        assert_eq!(entry.value["content"], "hi");
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let store = InMemoryBackend::new();
        store
            .put(CacheKind::Llm, CacheEntry::new("k1", json!(1)))
            .await
            .unwrap();

        assert!(store.get(CacheKind::Actions, "k1").await.unwrap().is_none());
        assert_eq!(store.count(CacheKind::Actions).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn put_replaces_existing_key() {
        let store = InMemoryBackend::new();
        store.put(CacheKind::Llm, CacheEntry::new("k", json!(1))).await.unwrap();
        store.put(CacheKind::Llm, CacheEntry::new("k", json!(2))).await.unwrap();

        assert_eq!(store.count(CacheKind::Llm).await.unwrap(), 1);
        let entry = store.get(CacheKind::Llm, "k").await.unwrap().unwrap();
        assert_eq!(entry.value, json!(2));
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let store = InMemoryBackend::new();
        for key in ["a", "b", "c"] {
            store.put(CacheKind::Actions, CacheEntry::new(key, json!(key))).await.unwrap();
        }

        let removed = store
            .remove(CacheKind::Actions, &["a".to_string(), "zz".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(CacheKind::Actions).await.unwrap(), 2);

        store.clear(CacheKind::Actions).await.unwrap();
        assert_eq!(store.count(CacheKind::Actions).await.unwrap(), 0);
    }
}
