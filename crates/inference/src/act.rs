//! Action inference — instruction + page → one browser action or a skip.
//!
//! The model must pick a tool (`performAction` or `skipSection`). A reply
//! without a tool call is retried a bounded number of times with the same
//! `request_id`; once the attempts run out the engine returns
//! [`Outcome::Skip`] instead of failing. Transport errors and malformed
//! tool arguments are never retried.
//!
//! The model only ever sees variable *names*. [`ActionEngine::infer`]
//! returns the action exactly as the model wrote it, placeholders and all;
//! [`ActionEngine::act`] additionally splices in the real values.

use std::sync::Arc;

use chrono::Utc;
use stepwright_core::error::InferenceError;
use stepwright_core::event::{EventBus, InferenceEvent};
use stepwright_core::message::{Message, MessageToolCall};
use stepwright_core::outcome::{Action, Outcome};
use stepwright_core::provider::{ChatCompletionRequest, LlmClient, ToolChoice};
use stepwright_security::resolve_action;
use tracing::{debug, info, warn};

use crate::prompts::act::{ACTION_METHODS, PERFORM_ACTION};
use crate::prompts::{self, RETRY_NUDGE, SKIP_SECTION};
use crate::request::InferenceRequest;

/// Default number of extra attempts after a reply without a tool call.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

pub struct ActionEngine {
    client: Arc<dyn LlmClient>,
    model: Option<String>,
    temperature: f32,
    max_retries: u32,
    events: Option<Arc<EventBus>>,
}

impl ActionEngine {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            model: None,
            temperature: 0.1,
            max_retries: DEFAULT_MAX_RETRIES,
            events: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Infer the next action and resolve variable placeholders in its args.
    pub async fn act(&self, request: &InferenceRequest) -> Result<Outcome, InferenceError> {
        let outcome = self.infer(request).await?;
        Ok(match outcome {
            Outcome::Action(action) => Outcome::Action(resolve_action(&action, &request.variables)),
            other => other,
        })
    }

    /// Infer the next action with placeholders left unresolved.
    pub async fn infer(&self, request: &InferenceRequest) -> Result<Outcome, InferenceError> {
        let caps = self.client.capabilities();
        let mut messages = prompts::act::messages(request, &caps);
        let max_attempts = self.max_retries + 1;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                messages.push(Message::user(RETRY_NUDGE));
            }

            let chat = ChatCompletionRequest::new(messages.clone(), &request.request_id)
                .with_tools(prompts::act::tools(), ToolChoice::Required)
                .with_temperature(self.temperature)
                .with_model(self.model.clone());

            debug!(request_id = %request.request_id, attempt, "Requesting action");
            let response = self.client.create_chat_completion(chat).await?;

            let Some(call) = response.first_tool_call() else {
                warn!(
                    request_id = %request.request_id,
                    attempt,
                    max_attempts,
                    "Model replied without a tool call"
                );
                self.publish(InferenceEvent::ToolCallMissing {
                    operation: "act".into(),
                    request_id: request.request_id.clone(),
                    attempt,
                    timestamp: Utc::now(),
                });
                if !response.content.is_empty() {
                    messages.push(Message::assistant(response.content.clone()));
                }
                continue;
            };

            let outcome = interpret(call)?;
            info!(
                request_id = %request.request_id,
                attempt,
                skipped = outcome.is_skip(),
                "Action resolved"
            );
            self.publish_resolved(&request.request_id, outcome.is_skip());
            return Ok(outcome);
        }

        warn!(
            request_id = %request.request_id,
            max_attempts,
            "No tool call after all attempts, skipping"
        );
        self.publish_resolved(&request.request_id, true);
        Ok(Outcome::Skip)
    }

    fn publish(&self, event: InferenceEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    fn publish_resolved(&self, request_id: &str, skipped: bool) {
        self.publish(InferenceEvent::OutcomeResolved {
            operation: "act".into(),
            request_id: request_id.to_string(),
            skipped,
            timestamp: Utc::now(),
        });
    }
}

/// Turn the selected tool into an outcome.
fn interpret(call: &MessageToolCall) -> Result<Outcome, InferenceError> {
    match call.name.as_str() {
        SKIP_SECTION => Ok(Outcome::Skip),
        PERFORM_ACTION => {
            let args = call
                .parsed_arguments()
                .map_err(|e| InferenceError::parse("act", format!("arguments are not JSON: {e}")))?;
            let action: Action = serde_json::from_value(args)
                .map_err(|e| InferenceError::parse("act", e.to_string()))?;
            if !ACTION_METHODS.contains(&action.method.as_str()) {
                return Err(InferenceError::parse(
                    "act",
                    format!("unsupported method '{}'", action.method),
                ));
            }
            if action.target_element_ref.trim().is_empty() && action.method != "goto" {
                return Err(InferenceError::parse("act", "empty target_element_ref"));
            }
            Ok(Outcome::Action(action))
        }
        other => Err(InferenceError::parse("act", format!("unknown tool '{other}'"))),
    }
}
