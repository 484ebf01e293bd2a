//! SQLite cache backend.
//!
//! A single table keyed by (kind, key). Values are stored as JSON text and
//! creation times as RFC 3339 so eviction can order by age.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use stepwright_core::cache::{CacheEntry, CacheEntryMeta, CacheKind, CacheStore};
use stepwright_core::error::CacheError;
use tracing::{debug, info};

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| CacheError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Each connection to an in-memory database sees its own database
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::Storage(format!("Failed to open SQLite: {e}")))?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        info!("SQLite cache backend initialized at {path}");
        Ok(backend)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CacheError> {
        let backend = Self { pool };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                kind        TEXT NOT NULL,
                key         TEXT NOT NULL,
                value       TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (kind, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("cache_entries table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cache_entries_created_at ON cache_entries(kind, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite cache migrations complete");
        Ok(())
    }

    fn parse_created_at(raw: &str) -> chrono::DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

#[async_trait]
impl CacheStore for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query("SELECT value, created_at FROM cache_entries WHERE kind = ?1 AND key = ?2")
            .bind(kind.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::Storage(format!("SELECT failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value_text: String = row
            .try_get("value")
            .map_err(|e| CacheError::Storage(format!("value column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| CacheError::Storage(format!("created_at column: {e}")))?;
        let value = serde_json::from_str(&value_text)
            .map_err(|e| CacheError::Serialization(format!("Corrupted cache value: {e}")))?;

        Ok(Some(CacheEntry {
            key: key.to_string(),
            value,
            created_at: Self::parse_created_at(&created_at),
        }))
    }

    async fn put(&self, kind: CacheKind, entry: CacheEntry) -> Result<(), CacheError> {
        let value_text = serde_json::to_string(&entry.value)
            .map_err(|e| CacheError::Serialization(format!("Value serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (kind, key, value, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(kind, key) DO UPDATE SET
                value = excluded.value,
                created_at = excluded.created_at
            "#,
        )
        .bind(kind.as_str())
        .bind(&entry.key)
        .bind(&value_text)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(format!("INSERT failed: {e}")))?;

        Ok(())
    }

    async fn remove(&self, kind: CacheKind, keys: &[String]) -> Result<usize, CacheError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CacheError::Storage(format!("BEGIN failed: {e}")))?;

        let mut removed = 0usize;
        for key in keys {
            let result = sqlx::query("DELETE FROM cache_entries WHERE kind = ?1 AND key = ?2")
                .bind(kind.as_str())
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|e| CacheError::Storage(format!("DELETE failed: {e}")))?;
            removed += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| CacheError::Storage(format!("COMMIT failed: {e}")))?;
        Ok(removed)
    }

    async fn list(&self, kind: CacheKind) -> Result<Vec<CacheEntryMeta>, CacheError> {
        let rows = sqlx::query(
            "SELECT key, created_at FROM cache_entries WHERE kind = ?1 ORDER BY created_at ASC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(format!("SELECT failed: {e}")))?;

        rows.iter()
            .map(|row| {
                let key: String = row
                    .try_get("key")
                    .map_err(|e| CacheError::Storage(format!("key column: {e}")))?;
                let created_at: String = row
                    .try_get("created_at")
                    .map_err(|e| CacheError::Storage(format!("created_at column: {e}")))?;
                Ok(CacheEntryMeta {
                    key,
                    created_at: Self::parse_created_at(&created_at),
                })
            })
            .collect()
    }

    async fn count(&self, kind: CacheKind) -> Result<usize, CacheError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM cache_entries WHERE kind = ?1")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CacheError::Storage(format!("COUNT failed: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| CacheError::Storage(format!("count column: {e}")))?;
        Ok(n as usize)
    }

    async fn clear(&self, kind: CacheKind) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE kind = ?1")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Storage(format!("DELETE failed: {e}")))?;
        Ok(())
    }
}
