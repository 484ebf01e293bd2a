//! `assert` steps: infer an assertion and verify it on the page.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stepwright_core::error::StepError;
use stepwright_core::outcome::Outcome;
use stepwright_inference::{AssertionEngine, InferenceRequest, Operation};
use stepwright_security::substitute_variables;

use crate::context::ExecutionContext;
use crate::handler::{StepHandler, parse_params};

#[derive(Deserialize)]
struct AssertParams {
    instruction: String,
}

pub struct AssertHandler {
    engine: AssertionEngine,
}

impl AssertHandler {
    pub fn new(engine: AssertionEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StepHandler for AssertHandler {
    fn step_type(&self) -> &str {
        "assert"
    }

    async fn handle(
        &self,
        params: &serde_json::Value,
        ctx: &mut ExecutionContext,
        request_id: &str,
    ) -> Result<serde_json::Value, StepError> {
        let params: AssertParams = parse_params("assert", params)?;
        let dom = ctx.page.dom_snapshot().await?;
        let request = InferenceRequest::new(Operation::Assert, &params.instruction, dom, request_id)
            .with_variables(ctx.variables.clone());

        let Outcome::Assertion(assertion) = self.engine.assert(&request).await? else {
            ctx.record(format!("Skipped check: {}", params.instruction));
            return Ok(json!({"skipped": true}));
        };

        let mut resolved = assertion.clone();
        resolved.value = assertion
            .value
            .as_deref()
            .map(|v| substitute_variables(v, &ctx.variables));

        if !ctx.page.verify(&resolved).await? {
            return Err(StepError::AssertionFailed(assertion.step_description));
        }

        ctx.record(format!("Verified: {}", assertion.step_description));
        Ok(json!({
            "skipped": false,
            "passed": true,
            "assertion": assertion,
        }))
    }
}
