use async_trait::async_trait;
use serde::Deserialize;
use stepwright_core::error::StepError;
use stepwright_inference::{InferenceRequest, ObservationEngine, Operation};

use crate::context::ExecutionContext;
use crate::handler::{StepHandler, parse_params, to_output};

#[derive(Deserialize)]
struct ObserveParams {
    instruction: String,
}

pub struct ObserveHandler {
    engine: ObservationEngine,
}

impl ObserveHandler {
    pub fn new(engine: ObservationEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StepHandler for ObserveHandler {
    fn step_type(&self) -> &str {
        "observe"
    }

    async fn handle(
        &self,
        params: &serde_json::Value,
        ctx: &mut ExecutionContext,
        request_id: &str,
    ) -> Result<serde_json::Value, StepError> {
        let params: ObserveParams = parse_params("observe", params)?;
        let dom = ctx.page.dom_snapshot().await?;
        let request = InferenceRequest::new(Operation::Observe, &params.instruction, dom, request_id)
            .with_prior_steps(ctx.narrative.clone())
            .with_variables(ctx.variables.clone());

        let observation = self.engine.observe(&request).await?;
        to_output(&observation)
    }
}
