//! Request-scoped content-addressable cache.
//!
//! A key may be served to any number of request ids, but each
//! (key, request id) pair yields a hit at most once. The second lookup of
//! the same pair is a miss, so two targets inside one logical operation
//! that fingerprint identically are both computed fresh.
//!
//! Store failures never escape: reads degrade to a miss and writes are
//! logged and dropped.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use stepwright_core::cache::{CacheEntry, CacheKind, CacheStore};
use stepwright_core::error::CacheError;
use stepwright_core::event::{EventBus, InferenceEvent};
use tracing::{debug, warn};

use crate::fingerprint::fingerprint;

/// Bounds applied by the write-time cleanup pass and the consumption ledger.
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    /// Entries kept per partition; the oldest beyond this are evicted
    pub max_entries: usize,

    /// Entries older than this are dropped and never served
    pub max_age: Duration,

    /// Request ids remembered by the consumption ledger at once
    pub max_tracked_requests: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            max_tracked_requests: 1_024,
        }
    }
}

/// Snapshot of one cache partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub kind: CacheKind,
    pub backend: String,
    pub entries: usize,
    pub tracked_requests: usize,
}

/// Which keys each request id has already been served.
///
/// Bounded: when a new request id would exceed `capacity`, the oldest
/// tracked request is forgotten.
#[derive(Debug)]
struct ConsumptionLedger {
    consumed: HashMap<String, HashSet<String>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ConsumptionLedger {
    fn new(capacity: usize) -> Self {
        Self {
            consumed: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn is_consumed(&self, key: &str, request_id: &str) -> bool {
        self.consumed
            .get(request_id)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Record the pair. Returns false if it was already recorded.
    fn try_consume(&mut self, key: &str, request_id: &str) -> bool {
        if !self.consumed.contains_key(request_id) {
            while self.order.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.consumed.remove(&oldest);
                    debug!(request_id = %oldest, "Consumption ledger full, forgetting oldest request");
                }
            }
            self.order.push_back(request_id.to_string());
        }
        self.consumed
            .entry(request_id.to_string())
            .or_default()
            .insert(key.to_string())
    }

    fn release(&mut self, request_id: &str) -> bool {
        self.order.retain(|id| id != request_id);
        self.consumed.remove(request_id).is_some()
    }

    fn clear(&mut self) {
        self.consumed.clear();
        self.order.clear();
    }

    fn tracked(&self) -> usize {
        self.order.len()
    }
}

/// One partition of the durable store with fingerprinting and dedup.
pub struct ContentAddressableCache {
    store: Arc<dyn CacheStore>,
    kind: CacheKind,
    policy: EvictionPolicy,
    ledger: Mutex<ConsumptionLedger>,
    events: Option<Arc<EventBus>>,
}

impl ContentAddressableCache {
    pub fn new(store: Arc<dyn CacheStore>, kind: CacheKind, policy: EvictionPolicy) -> Self {
        let ledger = Mutex::new(ConsumptionLedger::new(policy.max_tracked_requests));
        Self {
            store,
            kind,
            policy,
            ledger,
            events: None,
        }
    }

    /// Publish a `CacheLookup` event for every lookup.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    fn ledger(&self) -> MutexGuard<'_, ConsumptionLedger> {
        // The ledger holds no invariants a panicking holder could break
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up the value cached for `options`, consuming it for `request_id`.
    pub async fn get(&self, options: &serde_json::Value, request_id: &str) -> Option<serde_json::Value> {
        let key = fingerprint(options);
        self.get_by_key(&key, request_id).await
    }

    /// Look up a precomputed key.
    pub async fn get_by_key(&self, key: &str, request_id: &str) -> Option<serde_json::Value> {
        let value = self.lookup(key, request_id).await;
        debug!(kind = %self.kind, key, request_id, hit = value.is_some(), "Cache lookup");
        if let Some(events) = &self.events {
            events.publish(InferenceEvent::CacheLookup {
                kind: self.kind,
                request_id: request_id.to_string(),
                hit: value.is_some(),
                timestamp: Utc::now(),
            });
        }
        value
    }

    async fn lookup(&self, key: &str, request_id: &str) -> Option<serde_json::Value> {
        if self.ledger().is_consumed(key, request_id) {
            return None;
        }

        let entry = match self.store.get(self.kind, key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(kind = %self.kind, key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        if self.is_expired(&entry) {
            return None;
        }

        // A concurrent lookup for the same pair may have won the race
        // between the check above and here.
        if self.ledger().try_consume(key, request_id) {
            Some(entry.value)
        } else {
            None
        }
    }

    /// Store `value` for `options` and run the cleanup pass.
    ///
    /// The pair counts as consumed by `request_id`: the caller already has
    /// the value it just computed.
    pub async fn set(&self, options: &serde_json::Value, value: serde_json::Value, request_id: &str) {
        let key = fingerprint(options);
        self.set_by_key(&key, value, request_id).await;
    }

    pub async fn set_by_key(&self, key: &str, value: serde_json::Value, request_id: &str) {
        if let Err(e) = self.store.put(self.kind, CacheEntry::new(key, value)).await {
            warn!(kind = %self.kind, key, error = %e, "Cache write failed, dropping entry");
            return;
        }
        self.ledger().try_consume(key, request_id);
        debug!(kind = %self.kind, key, request_id, "Cache entry stored");
        self.cleanup().await;
    }

    /// Drop expired entries, then evict the oldest beyond `max_entries`.
    /// Returns how many entries were removed.
    pub async fn cleanup(&self) -> usize {
        match self.try_cleanup().await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(kind = %self.kind, removed, "Cache cleanup evicted entries");
                }
                removed
            }
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Cache cleanup failed");
                0
            }
        }
    }

    async fn try_cleanup(&self) -> Result<usize, CacheError> {
        let metas = self.store.list(self.kind).await?;
        let cutoff = self.cutoff();

        let (expired, mut live): (Vec<_>, Vec<_>) =
            metas.into_iter().partition(|m| m.created_at < cutoff);
        let mut doomed: Vec<String> = expired.into_iter().map(|m| m.key).collect();

        if live.len() > self.policy.max_entries {
            live.sort_by_key(|m| m.created_at);
            let excess = live.len() - self.policy.max_entries;
            doomed.extend(live.into_iter().take(excess).map(|m| m.key));
        }

        if doomed.is_empty() {
            return Ok(0);
        }
        self.store.remove(self.kind, &doomed).await
    }

    fn cutoff(&self) -> chrono::DateTime<Utc> {
        let max_age = chrono::Duration::from_std(self.policy.max_age)
            .unwrap_or(chrono::Duration::MAX);
        Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.created_at < self.cutoff()
    }

    /// Forget everything `request_id` has consumed. Call once the logical
    /// operation that owned the id has finished.
    pub fn release_request(&self, request_id: &str) -> bool {
        self.ledger().release(request_id)
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.store.count(self.kind).await?;
        Ok(CacheStats {
            kind: self.kind,
            backend: self.store.name().to_string(),
            entries,
            tracked_requests: self.ledger().tracked(),
        })
    }

    /// Empty this partition and forget all consumption records.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear(self.kind).await?;
        self.ledger().clear();
        Ok(())
    }
}
