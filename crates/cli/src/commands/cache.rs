//! `stepwright cache` — cache inspection and maintenance.

use std::sync::Arc;
use std::time::Duration;

use stepwright_cache::{
    ContentAddressableCache, EvictionPolicy, FileBackend, InMemoryBackend, NoopCache, SqliteBackend,
};
use stepwright_config::{AppConfig, CacheConfig};
use stepwright_core::cache::{CacheKind, CacheStore};

/// Open the store the config names.
pub async fn open_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, Box<dyn std::error::Error>> {
    let store: Arc<dyn CacheStore> = match config.backend.as_str() {
        "file" => Arc::new(FileBackend::new(config.resolved_dir())),
        "sqlite" => {
            let dir = config.resolved_dir();
            std::fs::create_dir_all(&dir)?;
            let url = format!("sqlite://{}", dir.join("cache.sqlite").display());
            Arc::new(SqliteBackend::new(&url).await?)
        }
        "memory" => Arc::new(InMemoryBackend::new()),
        _ => Arc::new(NoopCache),
    };
    Ok(store)
}

pub fn policy(config: &CacheConfig) -> EvictionPolicy {
    EvictionPolicy {
        max_entries: config.max_entries,
        max_age: Duration::from_secs(config.max_age_secs),
        max_tracked_requests: config.max_tracked_requests,
    }
}

pub async fn stats() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = open_store(&config.cache).await?;

    println!("Cache Statistics");
    println!("================");
    println!("  Backend:   {}", store.name());
    if matches!(config.cache.backend.as_str(), "file" | "sqlite") {
        println!("  Directory: {}", config.cache.resolved_dir().display());
    }
    println!(
        "  Limits:    {} entries, {}s max age",
        config.cache.max_entries, config.cache.max_age_secs
    );

    for kind in CacheKind::ALL {
        let cache = ContentAddressableCache::new(store.clone(), kind, policy(&config.cache));
        let stats = cache.stats().await?;
        println!("  {:<9}  {} entries", format!("{kind}:"), stats.entries);
    }

    Ok(())
}

pub async fn clear(confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("This deletes every cached LLM response and action.");
        println!("Run with --confirm to proceed:");
        println!("  stepwright cache clear --confirm");
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = open_store(&config.cache).await?;
    for kind in CacheKind::ALL {
        ContentAddressableCache::new(store.clone(), kind, policy(&config.cache))
            .clear()
            .await?;
        println!("Cleared {kind} partition.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_backend_opens_noop_store() {
        let config = CacheConfig {
            backend: "none".into(),
            ..CacheConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "none");
    }

    #[test]
    fn policy_follows_config() {
        let config = CacheConfig {
            max_entries: 5,
            max_age_secs: 60,
            max_tracked_requests: 7,
            ..CacheConfig::default()
        };
        let policy = policy(&config);
        assert_eq!(policy.max_entries, 5);
        assert_eq!(policy.max_age, Duration::from_secs(60));
        assert_eq!(policy.max_tracked_requests, 7);
    }
}
