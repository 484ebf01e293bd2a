use async_trait::async_trait;
use serde::Deserialize;
use stepwright_core::error::StepError;
use stepwright_inference::VisualCheckEngine;

use crate::context::ExecutionContext;
use crate::handler::{StepHandler, parse_params, to_output};

#[derive(Deserialize)]
struct VisualCheckParams {
    prompt: String,
}

/// A failed check fails the step; the verdict message becomes its error.
pub struct VisualCheckHandler {
    engine: VisualCheckEngine,
}

impl VisualCheckHandler {
    pub fn new(engine: VisualCheckEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StepHandler for VisualCheckHandler {
    fn step_type(&self) -> &str {
        "visual_check"
    }

    async fn handle(
        &self,
        params: &serde_json::Value,
        ctx: &mut ExecutionContext,
        request_id: &str,
    ) -> Result<serde_json::Value, StepError> {
        let params: VisualCheckParams = parse_params("visual_check", params)?;
        let result = self
            .engine
            .check(ctx.page.as_ref(), &params.prompt, request_id)
            .await;

        if !result.success {
            return Err(StepError::AssertionFailed(result.message));
        }
        ctx.record(format!("Visually confirmed: {}", params.prompt));
        to_output(&result)
    }
}
