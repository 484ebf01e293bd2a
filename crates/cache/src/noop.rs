//! No-op cache backend — disables caching entirely.

use async_trait::async_trait;
use stepwright_core::cache::{CacheEntry, CacheEntryMeta, CacheKind, CacheStore};
use stepwright_core::error::CacheError;

/// A cache store that stores nothing. Every lookup misses.
pub struct NoopCache;

#[async_trait]
impl CacheStore for NoopCache {
    fn name(&self) -> &str { "none" }

    async fn get(&self, _kind: CacheKind, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _kind: CacheKind, _entry: CacheEntry) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _kind: CacheKind, _keys: &[String]) -> Result<usize, CacheError> {
        Ok(0)
    }

    async fn list(&self, _kind: CacheKind) -> Result<Vec<CacheEntryMeta>, CacheError> {
        Ok(Vec::new())
    }

    async fn count(&self, _kind: CacheKind) -> Result<usize, CacheError> {
        Ok(0)
    }

    async fn clear(&self, _kind: CacheKind) -> Result<(), CacheError> {
        Ok(())
    }
}
