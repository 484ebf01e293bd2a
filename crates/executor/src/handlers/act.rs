//! `act` steps: infer an action, then have the page perform it.
//!
//! Resolved actions can be cached in the `actions` partition, keyed by the
//! instruction, a digest of the DOM and the placeholder names on offer. The cached copy keeps its `{{NAME}}`
//! placeholders; values are spliced in only right before `perform`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stepwright_cache::{ContentAddressableCache, sha256_hex};
use stepwright_core::error::StepError;
use stepwright_core::outcome::{Action, Outcome};
use stepwright_inference::{ActionEngine, InferenceRequest, Operation};
use stepwright_security::resolve_action;
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::handler::{StepHandler, parse_params};

#[derive(Deserialize)]
struct ActParams {
    instruction: String,
    #[serde(default)]
    settle_timeout_ms: Option<u64>,
}

pub struct ActHandler {
    engine: ActionEngine,
    cache: Option<Arc<ContentAddressableCache>>,
}

impl ActHandler {
    pub fn new(engine: ActionEngine) -> Self {
        Self { engine, cache: None }
    }

    pub fn with_cache(mut self, cache: Arc<ContentAddressableCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn cached_action(&self, options: &serde_json::Value, request_id: &str) -> Option<Action> {
        let cache = self.cache.as_ref()?;
        let value = cache.get(options, request_id).await?;
        match serde_json::from_value(value) {
            Ok(action) => Some(action),
            Err(e) => {
                warn!(request_id, error = %e, "Cached action unreadable, inferring again");
                None
            }
        }
    }
}

#[async_trait]
impl StepHandler for ActHandler {
    fn step_type(&self) -> &str {
        "act"
    }

    async fn handle(
        &self,
        params: &serde_json::Value,
        ctx: &mut ExecutionContext,
        request_id: &str,
    ) -> Result<serde_json::Value, StepError> {
        let params: ActParams = parse_params("act", params)?;
        let dom = ctx.page.dom_snapshot().await?;

        let request = InferenceRequest::new(Operation::Act, &params.instruction, dom, request_id)
            .with_prior_steps(ctx.narrative.clone())
            .with_variables(ctx.variables.clone());

        // Actions may only be replayed where the same placeholders are on offer
        let cache_options = json!({
            "op": "act",
            "instruction": params.instruction,
            "dom": sha256_hex(request.dom_snapshot.as_bytes()),
            "variables": request.variable_placeholders(),
        });

        let (action, cached) = match self.cached_action(&cache_options, request_id).await {
            Some(action) => {
                debug!(request_id, method = %action.method, "Action served from cache");
                (action, true)
            }
            None => match self.engine.infer(&request).await? {
                Outcome::Action(action) => {
                    if let Some(cache) = &self.cache {
                        if let Ok(value) = serde_json::to_value(&action) {
                            cache.set(&cache_options, value, request_id).await;
                        }
                    }
                    (action, false)
                }
                _ => {
                    info!(request_id, instruction = %params.instruction, "Act step skipped");
                    ctx.record(format!("Skipped: {}", params.instruction));
                    return Ok(json!({"skipped": true}));
                }
            }
        };

        let resolved = resolve_action(&action, &ctx.variables);
        ctx.page.perform(&resolved, params.settle_timeout_ms).await?;
        ctx.record(action.step_description.clone());

        Ok(json!({
            "skipped": false,
            "cached": cached,
            "action": action,
        }))
    }
}
