//! StepExecutor — runs a plan strictly in order.

use std::time::Instant;

use chrono::Utc;
use stepwright_core::error::StepError;
use stepwright_core::event::InferenceEvent;
use stepwright_security::redact_values;
use tracing::{info, warn};

use crate::context::ExecutionContext;
use crate::handler::HandlerRegistry;
use crate::plan::{ExecutableStep, StepResult};

pub struct StepExecutor {
    registry: HandlerRegistry,
}

impl StepExecutor {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Run `plan` and return one result per executed step, in order.
    ///
    /// Handler errors are captured into the step's result with variable
    /// values redacted. A failing required step stops the plan; a failing
    /// optional step does not.
    pub async fn run(&self, plan: &[ExecutableStep], ctx: &mut ExecutionContext) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(plan.len());
        info!(request_id = %ctx.request_id, steps = plan.len(), "Running plan");

        for (index, step) in plan.iter().enumerate() {
            let step_request_id = ctx.step_request_id(index);
            ctx.events.publish(InferenceEvent::StepStarted {
                index,
                step_type: step.step_type.clone(),
                timestamp: Utc::now(),
            });
            let started = Instant::now();

            let outcome = match self.registry.get(&step.step_type) {
                Some(handler) => handler.handle(&step.params, ctx, &step_request_id).await,
                None => Err(StepError::UnknownStepType(step.step_type.clone())),
            };

            let result = match outcome {
                Ok(output) => StepResult::ok(output),
                Err(e) => StepResult::failed(redact_values(&e.to_string(), &ctx.variables)),
            };

            let duration_ms = started.elapsed().as_millis() as u64;
            ctx.events.publish(InferenceEvent::StepFinished {
                index,
                step_type: step.step_type.clone(),
                success: result.success,
                duration_ms,
                timestamp: Utc::now(),
            });

            let failed_required = !result.success && !step.optional;
            if result.success {
                info!(index, step_type = %step.step_type, duration_ms, "Step succeeded");
            } else {
                warn!(
                    index,
                    step_type = %step.step_type,
                    optional = step.optional,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Step failed"
                );
            }
            results.push(result);

            if failed_required {
                warn!(index, "Required step failed, halting plan");
                break;
            }
        }

        results
    }
}
