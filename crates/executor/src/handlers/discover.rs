use async_trait::async_trait;
use serde::Deserialize;
use stepwright_core::error::StepError;
use stepwright_inference::DiscoveryEngine;
use tracing::warn;

use crate::context::ExecutionContext;
use crate::handler::{StepHandler, parse_params, to_output};

#[derive(Deserialize)]
struct DiscoverParams {
    /// Attach a screenshot when the model can see images
    #[serde(default = "default_screenshot")]
    screenshot: bool,
}

fn default_screenshot() -> bool {
    true
}

pub struct DiscoverHandler {
    engine: DiscoveryEngine,
}

impl DiscoverHandler {
    pub fn new(engine: DiscoveryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StepHandler for DiscoverHandler {
    fn step_type(&self) -> &str {
        "discover"
    }

    async fn handle(
        &self,
        params: &serde_json::Value,
        ctx: &mut ExecutionContext,
        request_id: &str,
    ) -> Result<serde_json::Value, StepError> {
        let params: DiscoverParams = if params.is_null() {
            DiscoverParams {
                screenshot: default_screenshot(),
            }
        } else {
            parse_params("discover", params)?
        };

        let dom = ctx.page.dom_snapshot().await?;
        let screenshot = if params.screenshot {
            match ctx.page.screenshot(false).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(request_id, error = %e, "Discovery continuing without screenshot");
                    None
                }
            }
        } else {
            None
        };

        let objectives = self.engine.discover(&dom, screenshot, request_id).await;
        to_output(&objectives)
    }
}
