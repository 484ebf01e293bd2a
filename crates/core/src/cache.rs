//! CacheStore trait — the durable key→value collaborator.
//!
//! The store knows nothing about fingerprints or request ids; it keeps
//! opaque JSON values under content-hash keys, one logical partition per
//! [`CacheKind`]. Dedup semantics live in the cache crate on top of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Logical partition of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// Raw LLM responses
    Llm,
    /// Resolved browser commands
    Actions,
}

impl CacheKind {
    pub const ALL: [CacheKind; 2] = [CacheKind::Llm, CacheKind::Actions];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Llm => "llm",
            CacheKind::Actions => "actions",
        }
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm" => Ok(CacheKind::Llm),
            "actions" => Ok(CacheKind::Actions),
            other => Err(format!("unknown cache kind: {other}")),
        }
    }
}

/// A single cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content hash of the request options
    pub key: String,

    /// The cached value
    pub value: serde_json::Value,

    /// When this entry was written
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
            created_at: Utc::now(),
        }
    }
}

/// Key and age of an entry, for eviction passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryMeta {
    pub key: String,
    pub created_at: DateTime<Utc>,
}

/// The core CacheStore trait.
///
/// Implementations: JSONL files, SQLite, in-memory, none (no-op).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "none").
    fn name(&self) -> &str;

    /// Look up an entry by key.
    async fn get(&self, kind: CacheKind, key: &str)
    -> std::result::Result<Option<CacheEntry>, CacheError>;

    /// Insert or replace an entry.
    async fn put(&self, kind: CacheKind, entry: CacheEntry) -> std::result::Result<(), CacheError>;

    /// Remove entries by key. Returns how many were removed.
    async fn remove(&self, kind: CacheKind, keys: &[String])
    -> std::result::Result<usize, CacheError>;

    /// Keys and creation times of every entry in a partition.
    async fn list(&self, kind: CacheKind) -> std::result::Result<Vec<CacheEntryMeta>, CacheError>;

    /// Number of entries in a partition.
    async fn count(&self, kind: CacheKind) -> std::result::Result<usize, CacheError>;

    /// Drop every entry in a partition.
    async fn clear(&self, kind: CacheKind) -> std::result::Result<(), CacheError>;
}
