//! Inference event bus — pub/sub handle passed through execution context.
//!
//! There is no global emitter: whoever builds an engine or an executor hands
//! it an `Arc<EventBus>`, and observers subscribe on that same handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::cache::CacheKind;

/// Events published by engines, the cache, and the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InferenceEvent {
    /// The model answered in prose instead of selecting a tool
    ToolCallMissing {
        operation: String,
        request_id: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// An operation produced its typed outcome
    OutcomeResolved {
        operation: String,
        request_id: String,
        skipped: bool,
        timestamp: DateTime<Utc>,
    },

    /// A cache lookup finished
    CacheLookup {
        kind: CacheKind,
        request_id: String,
        hit: bool,
        timestamp: DateTime<Utc>,
    },

    /// A plan step began
    StepStarted {
        index: usize,
        step_type: String,
        timestamp: DateTime<Utc>,
    },

    /// A plan step finished
    StepFinished {
        index: usize,
        step_type: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<InferenceEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: InferenceEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<InferenceEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
