//! Per-operation inference engines.
//!
//! Every engine follows the same shape:
//!
//! 1. **Render** the operation's prompt from the request and the client's
//!    declared capabilities
//! 2. **Call** the LLM, either forcing a tool choice or asking for a JSON
//!    object matching a schema
//! 3. **Interpret** the reply into a typed outcome, retrying only where the
//!    operation allows it
//!
//! "Nothing applies" comes back as a value (`Skip`, an empty list,
//! `success = false`); "could not complete" comes back as an `Err`.

pub mod act;
pub mod assert;
pub mod discover;
pub mod extract;
pub mod observe;
pub mod prompts;
pub mod request;
pub mod schema;
pub mod visual_check;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use stepwright_config::InferenceConfig;
use stepwright_core::event::EventBus;
use stepwright_core::provider::LlmClient;

pub use act::ActionEngine;
pub use assert::AssertionEngine;
pub use discover::DiscoveryEngine;
pub use extract::{ExtractionEngine, ExtractionState, chunk_dom, merge_additive};
pub use observe::ObservationEngine;
pub use request::{InferenceRequest, Operation};
pub use visual_check::VisualCheckEngine;

/// All engines built over one client with shared settings.
pub struct Engines {
    pub act: ActionEngine,
    pub assert: AssertionEngine,
    pub observe: ObservationEngine,
    pub extract: ExtractionEngine,
    pub discover: DiscoveryEngine,
    pub visual_check: VisualCheckEngine,
}

impl Engines {
    pub fn new(
        client: Arc<dyn LlmClient>,
        config: &InferenceConfig,
        model: Option<String>,
        events: Option<Arc<EventBus>>,
    ) -> Self {
        let mut act = ActionEngine::new(client.clone())
            .with_model(model.clone())
            .with_temperature(config.tool_temperature)
            .with_max_retries(config.act_max_retries);
        let mut assert = AssertionEngine::new(client.clone())
            .with_model(model.clone())
            .with_temperature(config.tool_temperature);
        let mut observe = ObservationEngine::new(client.clone())
            .with_model(model.clone())
            .with_temperature(config.tool_temperature);
        let mut extract = ExtractionEngine::new(client.clone())
            .with_model(model.clone())
            .with_temperature(config.structured_temperature)
            .with_chunk_chars(config.extract_chunk_chars);

        if let Some(events) = events {
            act = act.with_events(events.clone());
            assert = assert.with_events(events.clone());
            observe = observe.with_events(events.clone());
            extract = extract.with_events(events);
        }

        Self {
            act,
            assert,
            observe,
            extract,
            discover: DiscoveryEngine::new(client.clone())
                .with_model(model.clone())
                .with_temperature(config.structured_temperature)
                .with_max_objectives(config.max_objectives),
            visual_check: VisualCheckEngine::new(client).with_model(model),
        }
    }
}
