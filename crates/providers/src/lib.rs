//! LLM client implementations for Stepwright.
//!
//! All clients implement the `stepwright_core::LlmClient` trait.
//! [`build_client`] creates the configured one.

pub mod openai_compat;
pub mod text_protocol;

use std::sync::Arc;

use stepwright_config::AppConfig;
use stepwright_core::error::ProviderError;
use stepwright_core::provider::{LlmClient, ModelCapabilities};

pub use openai_compat::OpenAiCompatClient;

/// Build the LLM client described by `config`.
///
/// The tool protocol is negotiated here, once, from the declared
/// capabilities.
pub fn build_client(config: &AppConfig) -> Result<Arc<dyn LlmClient>, ProviderError> {
    let capabilities = ModelCapabilities::negotiate(
        config.capabilities.supports_native_tools,
        config.capabilities.is_vision_capable,
    );

    let is_local = config.base_url.contains("localhost") || config.base_url.contains("127.0.0.1");
    let api_key = match (&config.api_key, is_local) {
        (Some(key), _) => key.clone(),
        (None, true) => String::new(),
        (None, false) => {
            return Err(ProviderError::NotConfigured(
                "No API key. Set STEPWRIGHT_API_KEY or api_key in config.toml".into(),
            ));
        }
    };

    let name = if config.base_url.contains("api.openai.com") {
        "openai"
    } else if config.base_url.contains("openrouter.ai") {
        "openrouter"
    } else {
        "custom"
    };

    let client = OpenAiCompatClient::new(
        name,
        &config.base_url,
        api_key,
        &config.default_model,
        capabilities,
    )?;
    Ok(Arc::new(client))
}
