//! Response cache in front of an [`LlmClient`].
//!
//! Fingerprints cover everything that shapes the model's answer: messages,
//! tools, tool choice, sampling parameters, model override, schema, and a
//! digest of any attached image. The request id is not part of the key; it
//! scopes dedup instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use stepwright_core::error::ProviderError;
use stepwright_core::provider::{
    ChatCompletionRequest, ChatCompletionResponse, ImageAttachment, LlmClient, ModelCapabilities,
    StructuredObjectRequest,
};
use tracing::{debug, warn};

use crate::content_cache::ContentAddressableCache;
use crate::fingerprint::sha256_hex;

/// Decorates any client with the `llm` cache partition.
pub struct CachingLlmClient {
    inner: Arc<dyn LlmClient>,
    cache: Arc<ContentAddressableCache>,
}

impl CachingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, cache: Arc<ContentAddressableCache>) -> Self {
        Self { inner, cache }
    }

    fn image_digest(image: &Option<ImageAttachment>) -> serde_json::Value {
        match image {
            Some(img) => json!({
                "sha256": sha256_hex(&img.buffer),
                "description": img.description,
            }),
            None => serde_json::Value::Null,
        }
    }

    fn chat_options(&self, request: &ChatCompletionRequest) -> serde_json::Value {
        json!({
            "op": "chat_completion",
            "client": self.inner.name(),
            "model": request.model,
            "messages": request.messages,
            "tools": request.tools,
            "tool_choice": request.tool_choice,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "frequency_penalty": request.frequency_penalty,
            "presence_penalty": request.presence_penalty,
            "image": Self::image_digest(&request.image),
        })
    }

    fn structured_options(&self, request: &StructuredObjectRequest) -> serde_json::Value {
        json!({
            "op": "structured_object",
            "client": self.inner.name(),
            "model": request.model,
            "messages": request.messages,
            "schema": request.schema,
            "temperature": request.temperature,
            "image": Self::image_digest(&request.image),
        })
    }
}

#[async_trait]
impl LlmClient for CachingLlmClient {
    fn name(&self) -> &str {
        "cached"
    }

    fn capabilities(&self) -> ModelCapabilities {
        self.inner.capabilities()
    }

    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let options = self.chat_options(&request);

        if let Some(value) = self.cache.get(&options, &request.request_id).await {
            match serde_json::from_value::<ChatCompletionResponse>(value) {
                Ok(response) => {
                    debug!(request_id = %request.request_id, "Serving chat completion from cache");
                    return Ok(response);
                }
                Err(e) => warn!(error = %e, "Cached chat completion unreadable, calling model"),
            }
        }

        let request_id = request.request_id.clone();
        let offered_tools = !request.tools.is_empty();
        let response = self.inner.create_chat_completion(request).await?;

        // Prose where a tool was offered is a miss the caller will retry
        if offered_tools && response.tool_calls.is_empty() {
            debug!(request_id = %request_id, "Reply without a tool call not cached");
            return Ok(response);
        }
        match serde_json::to_value(&response) {
            Ok(value) => self.cache.set(&options, value, &request_id).await,
            Err(e) => warn!(error = %e, "Chat completion not cacheable"),
        }
        Ok(response)
    }

    async fn generate_structured_object(
        &self,
        request: StructuredObjectRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let options = self.structured_options(&request);

        if let Some(value) = self.cache.get(&options, &request.request_id).await {
            debug!(request_id = %request.request_id, "Serving structured object from cache");
            return Ok(value);
        }

        let request_id = request.request_id.clone();
        let value = self.inner.generate_structured_object(request).await?;
        self.cache.set(&options, value.clone(), &request_id).await;
        Ok(value)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
