//! Per-run state handed to every step handler.

use std::sync::Arc;

use stepwright_core::event::EventBus;
use stepwright_core::page::PageDriver;
use stepwright_security::Variables;

/// Everything a handler needs besides its params.
///
/// The event bus is injected here; nothing in the executor publishes to a
/// global emitter.
pub struct ExecutionContext {
    /// Identifies the run; each step derives `{request_id}:{index}` from it
    pub request_id: String,
    pub page: Arc<dyn PageDriver>,
    pub variables: Variables,
    pub events: Arc<EventBus>,

    /// One line per completed step, fed back to act as prior steps
    pub narrative: Vec<String>,
}

impl ExecutionContext {
    pub fn new(page: Arc<dyn PageDriver>, variables: Variables, events: Arc<EventBus>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            page,
            variables,
            events,
            narrative: Vec::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Request id for the step at `index`, fixed across that step's retries.
    pub fn step_request_id(&self, index: usize) -> String {
        format!("{}:{}", self.request_id, index)
    }

    pub fn record(&mut self, line: impl Into<String>) {
        self.narrative.push(line.into());
    }
}
