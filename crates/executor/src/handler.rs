//! StepHandler trait and the registry the executor dispatches through.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use stepwright_core::error::StepError;

use crate::context::ExecutionContext;

/// Executes one kind of plan step.
///
/// Errors are captured into the step's result by the executor; a handler
/// never decides whether the plan halts.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// The step `type` this handler answers to.
    fn step_type(&self) -> &str;

    async fn handle(
        &self,
        params: &serde_json::Value,
        ctx: &mut ExecutionContext,
        request_id: &str,
    ) -> Result<serde_json::Value, StepError>;
}

/// Handlers keyed by step type.
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn StepHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler. Replaces any existing handler for the same type.
    pub fn register(&mut self, handler: Box<dyn StepHandler>) {
        self.handlers.insert(handler.step_type().to_string(), handler);
    }

    pub fn get(&self, step_type: &str) -> Option<&dyn StepHandler> {
        self.handlers.get(step_type).map(|h| h.as_ref())
    }

    /// Registered step types, sorted.
    pub fn step_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        types.sort();
        types
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize step params, mapping failures to [`StepError::InvalidParams`].
pub fn parse_params<T: DeserializeOwned>(
    step_type: &str,
    params: &serde_json::Value,
) -> Result<T, StepError> {
    serde_json::from_value(params.clone()).map_err(|e| StepError::InvalidParams {
        step_type: step_type.to_string(),
        reason: e.to_string(),
    })
}

/// Serialize a handler's output value.
pub fn to_output<T: Serialize>(value: &T) -> Result<serde_json::Value, StepError> {
    serde_json::to_value(value).map_err(|e| StepError::Output(e.to_string()))
}
