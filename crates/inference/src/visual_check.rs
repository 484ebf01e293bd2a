//! Visual yes/no checks against a full-page screenshot.
//!
//! Never fails: a blind model, a broken screenshot, a transport error or an
//! unparseable verdict all come back as `success = false` with a message.

use std::sync::Arc;

use serde::Deserialize;
use stepwright_core::outcome::VisualCheckResult;
use stepwright_core::page::PageDriver;
use stepwright_core::provider::{ImageAttachment, LlmClient, StructuredObjectRequest};
use tracing::{info, warn};

use crate::prompts;

#[derive(Deserialize)]
struct Verdict {
    passed: bool,
    reasoning: String,
}

pub struct VisualCheckEngine {
    client: Arc<dyn LlmClient>,
    model: Option<String>,
}

impl VisualCheckEngine {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, model: None }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Capture a full-page screenshot and ask the model about it.
    pub async fn check(
        &self,
        page: &dyn PageDriver,
        prompt: &str,
        request_id: &str,
    ) -> VisualCheckResult {
        if !self.client.capabilities().is_vision_capable {
            warn!(request_id, client = self.client.name(), "Visual check needs a vision-capable model");
            return VisualCheckResult::failure(
                prompt,
                format!("Model behind '{}' cannot read images", self.client.name()),
            );
        }

        let screenshot = match page.screenshot(true).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(request_id, error = %e, "Visual check screenshot failed");
                return VisualCheckResult::failure(prompt, format!("Could not capture screenshot: {e}"));
            }
        };

        self.check_screenshot(screenshot, prompt, request_id).await
    }

    /// Ask the model about screenshot bytes already in hand.
    pub async fn check_screenshot(
        &self,
        screenshot: Vec<u8>,
        prompt: &str,
        request_id: &str,
    ) -> VisualCheckResult {
        let request = StructuredObjectRequest::new(
            prompts::visual_check::messages(prompt),
            prompts::visual_check::schema(),
            request_id,
        )
        .with_image(Some(ImageAttachment {
            buffer: screenshot,
            description: Some("Full-page screenshot".into()),
        }))
        .with_temperature(0.0)
        .with_model(self.model.clone());

        let value = match self.client.generate_structured_object(request).await {
            Ok(value) => value,
            Err(e) => {
                warn!(request_id, error = %e, "Visual check request failed");
                return VisualCheckResult::failure(prompt, format!("Visual check request failed: {e}"));
            }
        };

        match serde_json::from_value::<Verdict>(value) {
            Ok(verdict) => {
                info!(request_id, passed = verdict.passed, "Visual check finished");
                VisualCheckResult::from_verdict(prompt, verdict.passed, verdict.reasoning)
            }
            Err(e) => {
                warn!(request_id, error = %e, "Visual check verdict unreadable");
                VisualCheckResult::failure(prompt, format!("Could not read the model's verdict: {e}"))
            }
        }
    }
}
