//! LlmClient trait — the narrow contract over LLM backends.
//!
//! The engines need exactly two kinds of call:
//! - a chat completion that may select one of a set of typed tools, and
//! - a structured-object call whose reply must match a JSON schema.
//!
//! Implementations: OpenAI-compatible endpoints, the caching decorator, and
//! scripted clients in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};

/// How tool calls travel between the adapter and the model.
///
/// Chosen once by the adapter from model capability; engines never look at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolProtocol {
    /// The API's native `tools` / `tool_choice` fields.
    #[default]
    Native,
    /// Tools rendered into the system prompt; the model replies with
    /// `<tool_call>` blocks that the adapter parses back.
    TextEmulated,
}

/// Capability descriptor supplied by the client adapter.
///
/// Prompt builders branch on this, never on the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub supports_native_tools: bool,
    pub is_vision_capable: bool,
    pub tool_protocol: ToolProtocol,
}

impl ModelCapabilities {
    /// Derive the tool protocol from what the model supports.
    pub fn negotiate(supports_native_tools: bool, is_vision_capable: bool) -> Self {
        Self {
            supports_native_tools,
            is_vision_capable,
            tool_protocol: if supports_native_tools {
                ToolProtocol::Native
            } else {
                ToolProtocol::TextEmulated
            },
        }
    }
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self::negotiate(true, false)
    }
}

/// A tool definition sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Whether and how the model must select a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    /// The model must call some tool.
    Required,
    None,
    /// The model must call this specific tool.
    Tool(String),
}

/// An image attached to a vision call.
#[derive(Clone, PartialEq)]
pub struct ImageAttachment {
    /// Raw PNG/JPEG bytes
    pub buffer: Vec<u8>,

    /// Optional text describing what the image shows
    pub description: Option<String>,
}

impl std::fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("bytes", &self.buffer.len())
            .field("description", &self.description)
            .finish()
    }
}

/// A chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionRequest {
    /// The conversation messages
    pub messages: Vec<Message>,

    /// Available tools the model can call
    pub tools: Vec<ToolDefinition>,

    pub tool_choice: ToolChoice,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    pub top_p: f32,

    pub frequency_penalty: f32,

    pub presence_penalty: f32,

    /// Correlates every retry, chunk and cache lookup of one logical operation
    pub request_id: String,

    /// Override the client's default model
    pub model: Option<String>,

    pub image: Option<ImageAttachment>,
}

impl ChatCompletionRequest {
    pub fn new(messages: Vec<Message>, request_id: impl Into<String>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            request_id: request_id.into(),
            model: None,
            image: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = choice;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_image(mut self, image: Option<ImageAttachment>) -> Self {
        self.image = image;
        self
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response to a chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Free-text content (may be empty when a tool was called)
    #[serde(default)]
    pub content: String,

    /// Tools the model selected, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// The first tool call, if the model made any.
    pub fn first_tool_call(&self) -> Option<&MessageToolCall> {
        self.tool_calls.first()
    }
}

/// A request for a JSON object matching `schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredObjectRequest {
    pub messages: Vec<Message>,

    /// JSON Schema the reply must satisfy
    pub schema: serde_json::Value,

    pub image: Option<ImageAttachment>,

    pub request_id: String,

    pub model: Option<String>,

    pub temperature: f32,
}

impl StructuredObjectRequest {
    pub fn new(
        messages: Vec<Message>,
        schema: serde_json::Value,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            schema,
            image: None,
            request_id: request_id.into(),
            model: None,
            temperature: 0.1,
        }
    }

    pub fn with_image(mut self, image: Option<ImageAttachment>) -> Self {
        self.image = image;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// The core LlmClient trait.
///
/// Transport failures surface as [`ProviderError`] and are never retried by
/// the engines; a reply in prose instead of a tool call is *not* an error
/// here, it is an empty `tool_calls` list.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openai", "cached").
    fn name(&self) -> &str;

    /// What the underlying model can do.
    fn capabilities(&self) -> ModelCapabilities;

    /// Send a chat completion, optionally offering tools.
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> std::result::Result<ChatCompletionResponse, ProviderError>;

    /// Ask for a JSON object conforming to `request.schema`.
    async fn generate_structured_object(
        &self,
        request: StructuredObjectRequest,
    ) -> std::result::Result<serde_json::Value, ProviderError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
