//! Observation: rank the elements relevant to an instruction.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use stepwright_core::error::InferenceError;
use stepwright_core::event::{EventBus, InferenceEvent};
use stepwright_core::outcome::{ElementDescriptor, Observation};
use stepwright_core::provider::{ChatCompletionRequest, LlmClient, ToolChoice};
use tracing::{debug, warn};

use crate::prompts::observe::REPORT_ELEMENTS;
use crate::prompts::{self, SKIP_SECTION};
use crate::request::InferenceRequest;

#[derive(Deserialize)]
struct ReportedElements {
    elements: Vec<ElementDescriptor>,
}

pub struct ObservationEngine {
    client: Arc<dyn LlmClient>,
    model: Option<String>,
    temperature: f32,
    events: Option<Arc<EventBus>>,
}

impl ObservationEngine {
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

    pub async fn observe(&self, request: &InferenceRequest) -> Result<Observation, InferenceError> {
        let caps = self.client.capabilities();
        let chat = ChatCompletionRequest::new(
            prompts::observe::messages(request, &caps),
            &request.request_id,
        )
        .with_tools(prompts::observe::tools(), ToolChoice::Required)
        .with_temperature(self.temperature)
        .with_model(self.model.clone());

        let response = self.client.create_chat_completion(chat).await?;

        let observation = match response.first_tool_call() {
            None => {
                warn!(request_id = %request.request_id, "Observation reply had no tool call");
                self.publish(InferenceEvent::ToolCallMissing {
                    operation: "observe".into(),
                    request_id: request.request_id.clone(),
                    attempt: 0,
                    timestamp: Utc::now(),
                });
                Observation::Skip
            }
            Some(call) if call.name == SKIP_SECTION => Observation::Skip,
            Some(call) if call.name == REPORT_ELEMENTS => {
                let args = call.parsed_arguments().map_err(|e| {
                    InferenceError::parse("observe", format!("arguments are not JSON: {e}"))
                })?;
                let reported: ReportedElements = serde_json::from_value(args)
                    .map_err(|e| InferenceError::parse("observe", e.to_string()))?;
                Observation::Elements(reported.elements)
            }
            Some(call) => {
                return Err(InferenceError::parse(
                    "observe",
                    format!("unknown tool '{}'", call.name),
                ));
            }
        };

        debug!(
            request_id = %request.request_id,
            elements = observation.elements().len(),
            "Observation resolved"
        );
        self.publish(InferenceEvent::OutcomeResolved {
            operation: "observe".into(),
            request_id: request.request_id.clone(),
            skipped: matches!(observation, Observation::Skip),
            timestamp: Utc::now(),
        });
        Ok(observation)
    }

    fn publish(&self, event: InferenceEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
