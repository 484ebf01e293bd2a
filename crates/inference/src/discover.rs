//! Test-objective discovery. Best effort: every failure is an empty list.

use std::sync::Arc;

use serde::Deserialize;
use stepwright_core::outcome::TestObjective;
use stepwright_core::provider::{ImageAttachment, LlmClient, StructuredObjectRequest};
use tracing::{debug, warn};

use crate::prompts;
use crate::schema;

pub const DEFAULT_MAX_OBJECTIVES: usize = 10;

#[derive(Deserialize)]
struct Proposed {
    objectives: Vec<TestObjective>,
}

pub struct DiscoveryEngine {
    client: Arc<dyn LlmClient>,
    model: Option<String>,
    temperature: f32,
    max_objectives: usize,
}

impl DiscoveryEngine {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            model: None,
            temperature: 0.1,
            max_objectives: DEFAULT_MAX_OBJECTIVES,
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

    pub fn with_max_objectives(mut self, max_objectives: usize) -> Self {
        self.max_objectives = max_objectives.max(1);
        self
    }

    /// Propose up to `max_objectives` objectives, highest priority first.
    ///
    /// The screenshot is attached only when the model can see images.
    pub async fn discover(
        &self,
        dom_snapshot: &str,
        screenshot: Option<Vec<u8>>,
        request_id: &str,
    ) -> Vec<TestObjective> {
        match self.try_discover(dom_snapshot, screenshot, request_id).await {
            Ok(objectives) => {
                debug!(request_id, count = objectives.len(), "Discovery finished");
                objectives
            }
            Err(reason) => {
                warn!(request_id, reason = %reason, "Discovery failed, returning no objectives");
                Vec::new()
            }
        }
    }

    async fn try_discover(
        &self,
        dom_snapshot: &str,
        screenshot: Option<Vec<u8>>,
        request_id: &str,
    ) -> Result<Vec<TestObjective>, String> {
        let image = screenshot
            .filter(|_| self.client.capabilities().is_vision_capable)
            .map(|buffer| ImageAttachment {
                buffer,
                description: Some("Screenshot of the page under test".into()),
            });

        let schema = prompts::discover::schema(self.max_objectives);
        let request = StructuredObjectRequest::new(
            prompts::discover::messages(dom_snapshot, self.max_objectives, image.is_some()),
            schema.clone(),
            request_id,
        )
        .with_image(image)
        .with_temperature(self.temperature)
        .with_model(self.model.clone());

        let value = self
            .client
            .generate_structured_object(request)
            .await
            .map_err(|e| e.to_string())?;

        // The bound is asked of the model but enforced by ranking and truncating
        let mut accepted = schema;
        if let Some(list) = accepted
            .pointer_mut("/properties/objectives")
            .and_then(serde_json::Value::as_object_mut)
        {
            list.remove("maxItems");
        }
        schema::validate(&value, &accepted)?;

        let mut objectives = serde_json::from_value::<Proposed>(value)
            .map_err(|e| e.to_string())?
            .objectives;
        for objective in &objectives {
            objective.validate()?;
        }

        objectives.sort_by_key(|o| o.priority);
        objectives.truncate(self.max_objectives);
        Ok(objectives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;
    use stepwright_core::error::ProviderError;
    use stepwright_core::outcome::Priority;
    use stepwright_core::provider::ModelCapabilities;

    fn objective(title: &str, priority: &str) -> serde_json::Value {
        json!({
            "title": title,
            "description": "Exercise the behaviour end to end",
            "priority": priority,
            "category": "functional",
            "complexity": "simple"
        })
    }

    #[tokio::test]
    async fn objectives_ranked_by_priority() {
        let client = Arc::new(SequentialMockClient::new().object(json!({"objectives": [
            objective("Footer links", "low"),
            objective("Login works", "high"),
            objective("Search filters", "medium"),
        ]})));
        let objectives = DiscoveryEngine::new(client).discover("<html/>", None, "req").await;
        let priorities: Vec<Priority> = objectives.iter().map(|o| o.priority).collect();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[tokio::test]
    async fn screenshot_attached_only_for_vision_models() {
        let blind = Arc::new(
            SequentialMockClient::new()
                .with_capabilities(ModelCapabilities::negotiate(true, false))
                .object(json!({"objectives": [objective("Login works", "high")]})),
        );
        DiscoveryEngine::new(blind.clone())
            .discover("<html/>", Some(vec![1, 2, 3]), "req")
            .await;
        assert!(blind.structured_requests.lock().unwrap()[0].image.is_none());

        let sighted = Arc::new(
            SequentialMockClient::new().object(json!({"objectives": [objective("Login works", "high")]})),
        );
        DiscoveryEngine::new(sighted.clone())
            .discover("<html/>", Some(vec![1, 2, 3]), "req")
            .await;
        let requests = sighted.structured_requests.lock().unwrap();
        assert_eq!(requests[0].image.as_ref().unwrap().buffer, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn constraint_violation_yields_empty_list() {
        let client = Arc::new(SequentialMockClient::new().object(json!({"objectives": [
            objective("Login works", "high"),
            objective("No", "high"),
        ]})));
        assert!(DiscoveryEngine::new(client).discover("<html/>", None, "req").await.is_empty());
    }

    #[tokio::test]
    async fn unknown_enum_value_yields_empty_list() {
        let client = Arc::new(
            SequentialMockClient::new().object(json!({"objectives": [objective("Login works", "urgent")]})),
        );
        assert!(DiscoveryEngine::new(client).discover("<html/>", None, "req").await.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_yields_empty_list() {
        let client = Arc::new(SequentialMockClient::new().object_error(ProviderError::Network("reset".into())));
        assert!(DiscoveryEngine::new(client).discover("<html/>", None, "req").await.is_empty());
    }

    #[tokio::test]
    async fn overlong_list_keeps_highest_priorities() {
        let client = Arc::new(SequentialMockClient::new().object(json!({"objectives": [
            objective("Signup works", "low"),
            objective("Logout works", "medium"),
            objective("Login works", "high"),
        ]})));
        let objectives = DiscoveryEngine::new(client.clone())
            .with_max_objectives(2)
            .discover("<html/>", None, "req")
            .await;
        let titles: Vec<&str> = objectives.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(titles, vec!["Login works", "Logout works"]);
        let requests = client.structured_requests.lock().unwrap();
        assert_eq!(requests[0].schema["properties"]["objectives"]["maxItems"], 2);
    }
}
