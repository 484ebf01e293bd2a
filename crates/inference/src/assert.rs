//! Assertion inference. One shot: a reply without a tool call is a skip.

use std::sync::Arc;

use chrono::Utc;
use stepwright_core::error::InferenceError;
use stepwright_core::event::{EventBus, InferenceEvent};
use stepwright_core::message::MessageToolCall;
use stepwright_core::outcome::{Assertion, Outcome};
use stepwright_core::provider::{ChatCompletionRequest, LlmClient, ToolChoice};
use tracing::{info, warn};

use crate::prompts::assert::{ASSERTION_METHODS, PERFORM_ASSERTION, VALUE_METHODS};
use crate::prompts::{self, SKIP_SECTION};
use crate::request::InferenceRequest;

pub struct AssertionEngine {
    client: Arc<dyn LlmClient>,
    model: Option<String>,
    temperature: f32,
    events: Option<Arc<EventBus>>,
}

impl AssertionEngine {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            model: None,
            temperature: 0.1,
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

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn assert(&self, request: &InferenceRequest) -> Result<Outcome, InferenceError> {
        let caps = self.client.capabilities();
        let chat = ChatCompletionRequest::new(
            prompts::assert::messages(request, &caps),
            &request.request_id,
        )
        .with_tools(prompts::assert::tools(), ToolChoice::Required)
        .with_temperature(self.temperature)
        .with_model(self.model.clone());

        let response = self.client.create_chat_completion(chat).await?;

        let outcome = match response.first_tool_call() {
            Some(call) => interpret(call)?,
            None => {
                warn!(request_id = %request.request_id, "Assertion reply had no tool call, skipping");
                self.publish(InferenceEvent::ToolCallMissing {
                    operation: "assert".into(),
                    request_id: request.request_id.clone(),
                    attempt: 0,
                    timestamp: Utc::now(),
                });
                Outcome::Skip
            }
        };

        info!(request_id = %request.request_id, skipped = outcome.is_skip(), "Assertion resolved");
        self.publish(InferenceEvent::OutcomeResolved {
            operation: "assert".into(),
            request_id: request.request_id.clone(),
            skipped: outcome.is_skip(),
            timestamp: Utc::now(),
        });
        Ok(outcome)
    }

    fn publish(&self, event: InferenceEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

fn interpret(call: &MessageToolCall) -> Result<Outcome, InferenceError> {
    match call.name.as_str() {
        SKIP_SECTION => Ok(Outcome::Skip),
        PERFORM_ASSERTION => {
            let args = call.parsed_arguments().map_err(|e| {
                InferenceError::parse("assert", format!("arguments are not JSON: {e}"))
            })?;
            let assertion: Assertion = serde_json::from_value(args)
                .map_err(|e| InferenceError::parse("assert", e.to_string()))?;

            let method = assertion.method.as_str();
            if !ASSERTION_METHODS.contains(&method) {
                return Err(InferenceError::parse(
                    "assert",
                    format!("unsupported matcher '{method}'"),
                ));
            }
            if VALUE_METHODS.contains(&method) && assertion.value.is_none() {
                return Err(InferenceError::parse(
                    "assert",
                    format!("matcher '{method}' requires a value"),
                ));
            }
            Ok(Outcome::Assertion(assertion))
        }
        other => Err(InferenceError::parse("assert", format!("unknown tool '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Operation;
    use crate::test_helpers::*;
    use serde_json::json;

    fn request() -> InferenceRequest {
        InferenceRequest::new(
            Operation::Assert,
            "The cart total is $42",
            r#"<span ref="e3" class="total">$42.00</span>"#,
            "req-7",
        )
    }

    #[tokio::test]
    async fn tool_call_becomes_assertion() {
        let client = Arc::new(SequentialMockClient::new().chat(make_tool_response(
            PERFORM_ASSERTION,
            json!({
                "method": "toContainText",
                "target_element_ref": "e3",
                "value": "$42",
                "completed": true,
                "step_description": "Cart total shows $42"
            }),
        )));
        let outcome = AssertionEngine::new(client.clone()).assert(&request()).await.unwrap();
        let assertion = outcome.as_assertion().unwrap();
        assert_eq!(assertion.method, "toContainText");
        assert_eq!(assertion.value.as_deref(), Some("$42"));

        let requests = client.chat_requests.lock().unwrap();
        assert_eq!(requests[0].tool_choice, ToolChoice::Required);
        assert_eq!(requests[0].tools[0].name, PERFORM_ASSERTION);
    }

    #[tokio::test]
    async fn missing_tool_call_skips_without_retry() {
        let client = Arc::new(SequentialMockClient::new().chat(make_text_response("Looks fine to me")));
        let outcome = AssertionEngine::new(client.clone()).assert(&request()).await.unwrap();
        assert!(outcome.is_skip());
        assert_eq!(client.chat_calls(), 1);
    }

    #[tokio::test]
    async fn value_matcher_without_value_is_parse_error() {
        let client = Arc::new(SequentialMockClient::new().chat(make_tool_response(
            PERFORM_ASSERTION,
            json!({
                "method": "toHaveText",
                "target_element_ref": "e3",
                "step_description": "Check total"
            }),
        )));
        let err = AssertionEngine::new(client).assert(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Parse { .. }));
    }

    #[tokio::test]
    async fn visibility_matcher_needs_no_value() {
        let client = Arc::new(SequentialMockClient::new().chat(make_tool_response(
            PERFORM_ASSERTION,
            json!({
                "method": "toBeVisible",
                "target_element_ref": "e3",
                "step_description": "Total is shown"
            }),
        )));
        let outcome = AssertionEngine::new(client).assert(&request()).await.unwrap();
        assert!(outcome.as_assertion().is_some());
    }
}
