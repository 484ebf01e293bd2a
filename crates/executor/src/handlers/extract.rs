use async_trait::async_trait;
use serde::Deserialize;
use stepwright_core::error::StepError;
use stepwright_inference::ExtractionEngine;
use tracing::info;

use crate::context::ExecutionContext;
use crate::handler::{StepHandler, parse_params, to_output};

#[derive(Deserialize)]
struct ExtractParams {
    instruction: String,
    schema: serde_json::Value,
}

/// Chunks the current DOM and extracts until the model reports completion.
pub struct ExtractHandler {
    engine: ExtractionEngine,
}

impl ExtractHandler {
    pub fn new(engine: ExtractionEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StepHandler for ExtractHandler {
    fn step_type(&self) -> &str {
        "extract"
    }

    async fn handle(
        &self,
        params: &serde_json::Value,
        ctx: &mut ExecutionContext,
        request_id: &str,
    ) -> Result<serde_json::Value, StepError> {
        let params: ExtractParams = parse_params("extract", params)?;
        if !params.schema.is_object() {
            return Err(StepError::InvalidParams {
                step_type: "extract".into(),
                reason: "schema must be a JSON Schema object".into(),
            });
        }

        let dom = ctx.page.dom_snapshot().await?;
        let result = self
            .engine
            .extract_all(&params.instruction, &params.schema, &dom, request_id)
            .await?;

        info!(
            request_id,
            fields = result.data.len(),
            completed = result.metadata.completed,
            "Extraction step finished"
        );
        ctx.record(format!("Extracted: {}", params.instruction));
        to_output(&result)
    }
}
