//! Content-addressable cache for Stepwright.
//!
//! [`ContentAddressableCache`] layers fingerprinting and request-scoped
//! dedup over any [`CacheStore`](stepwright_core::cache::CacheStore)
//! backend. [`CachingLlmClient`] puts it in front of an LLM client.

pub mod content_cache;
pub mod file_backend;
pub mod fingerprint;
pub mod in_memory;
pub mod llm;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use content_cache::{CacheStats, ContentAddressableCache, EvictionPolicy};
pub use file_backend::FileBackend;
pub use fingerprint::{canonicalize, fingerprint, sha256_hex};
pub use in_memory::InMemoryBackend;
pub use llm::CachingLlmClient;
pub use noop::NoopCache;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
