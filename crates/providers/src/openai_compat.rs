//! OpenAI-compatible LLM client.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, LM Studio, and any
//! endpoint exposing `/v1/chat/completions`.
//!
//! Supports:
//! - Chat completions with tools and `tool_choice`
//! - Text-emulated tool calls for models without native tool support
//! - Vision input as base64 `image_url` parts
//! - Structured output via `response_format: json_schema`

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use stepwright_core::error::ProviderError;
use stepwright_core::message::{Message, MessageToolCall, Role};
use stepwright_core::provider::*;
use tracing::{debug, warn};

use crate::text_protocol;

/// An OpenAI-compatible LLM client.
///
/// The tool protocol is fixed at construction from the declared
/// capabilities; callers never choose it per request.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    capabilities: ModelCapabilities,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new OpenAI-compatible client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        capabilities: ModelCapabilities,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            capabilities,
            client,
        })
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            api_key,
            model,
            ModelCapabilities::negotiate(true, true),
        )
    }

    /// Create an Ollama client (convenience constructor).
    ///
    /// Local models are assumed to lack native tools, so tool calls are
    /// text-emulated.
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
            ModelCapabilities::negotiate(false, false),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert our Message types to OpenAI API format, attaching `image` to
    /// the last user message.
    fn to_api_messages(messages: &[Message], image: Option<&ImageAttachment>) -> Vec<ApiMessage> {
        let image_target = image.and_then(|_| messages.iter().rposition(|m| m.role == Role::User));

        messages
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let content = match (image_target == Some(i), image) {
                    (true, Some(img)) => Self::vision_content(&m.content, img),
                    _ => serde_json::Value::String(m.content.clone()),
                };
                ApiMessage {
                    role: match m.role {
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::System => "system".into(),
                    },
                    content: Some(content),
                    tool_calls: None,
                }
            })
            .collect()
    }

    fn vision_content(text: &str, image: &ImageAttachment) -> serde_json::Value {
        let mut parts = vec![serde_json::json!({"type": "text", "text": text})];
        if let Some(description) = &image.description {
            parts.push(serde_json::json!({"type": "text", "text": description}));
        }
        parts.push(serde_json::json!({
            "type": "image_url",
            "image_url": {"url": Self::data_url(&image.buffer)},
        }));
        serde_json::Value::Array(parts)
    }

    fn data_url(bytes: &[u8]) -> String {
        let mime = if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            "image/jpeg"
        } else {
            "image/png"
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        format!("data:{mime};base64,{encoded}")
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn to_api_tool_choice(choice: &ToolChoice) -> serde_json::Value {
        match choice {
            ToolChoice::Auto => serde_json::json!("auto"),
            ToolChoice::Required => serde_json::json!("required"),
            ToolChoice::None => serde_json::json!("none"),
            ToolChoice::Tool(name) => serde_json::json!({
                "type": "function",
                "function": {"name": name},
            }),
        }
    }

    fn chat_body(&self, request: &ChatCompletionRequest) -> serde_json::Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let emulate = self.capabilities.tool_protocol == ToolProtocol::TextEmulated
            && !request.tools.is_empty();

        let messages = if emulate {
            text_protocol::encode_messages(&request.messages, &request.tools, &request.tool_choice)
        } else {
            request.messages.clone()
        };

        let mut body = serde_json::json!({
            "model": model,
            "messages": Self::to_api_messages(&messages, request.image.as_ref()),
            "temperature": request.temperature,
            "top_p": request.top_p,
            "frequency_penalty": request.frequency_penalty,
            "presence_penalty": request.presence_penalty,
            "stream": false,
        });

        if !emulate && !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = Self::to_api_tool_choice(&request.tool_choice);
        }
        body
    }

    fn structured_body(&self, request: &StructuredObjectRequest) -> serde_json::Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        serde_json::json!({
            "model": model,
            "messages": Self::to_api_messages(&request.messages, request.image.as_ref()),
            "temperature": request.temperature,
            "stream": false,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "structured_output",
                    "schema": request.schema,
                    "strict": false,
                },
            },
        })
    }

    /// POST to `/chat/completions` and map HTTP failures.
    async fn send(&self, body: &serde_json::Value, request_id: &str) -> Result<ApiResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(provider = %self.name, model = %body["model"], request_id, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::ModelNotFound(body["model"].to_string()));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))
    }

    fn first_choice(api_response: ApiResponse) -> Result<(ApiChoice, Option<Usage>), ProviderError> {
        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;
        Ok((choice, usage))
    }

    /// The text of a reply message; content may be a string or text parts.
    fn content_text(content: Option<serde_json::Value>) -> String {
        match content {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> std::result::Result<ChatCompletionResponse, ProviderError> {
        let body = self.chat_body(&request);
        let api_response = self.send(&body, &request.request_id).await?;
        let (choice, usage) = Self::first_choice(api_response)?;

        let content = Self::content_text(choice.message.content);
        let native_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let (content, tool_calls) = if native_calls.is_empty()
            && self.capabilities.tool_protocol == ToolProtocol::TextEmulated
            && !request.tools.is_empty()
        {
            text_protocol::decode_reply(&content)
        } else {
            (content, native_calls)
        };

        Ok(ChatCompletionResponse {
            content,
            tool_calls,
            usage,
        })
    }

    async fn generate_structured_object(
        &self,
        request: StructuredObjectRequest,
    ) -> std::result::Result<serde_json::Value, ProviderError> {
        let body = self.structured_body(&request);
        let api_response = self.send(&body, &request.request_id).await?;
        let (choice, _) = Self::first_choice(api_response)?;

        let content = Self::content_text(choice.message.content);
        serde_json::from_str(text_protocol::strip_code_fence(&content)).map_err(|e| {
            ProviderError::InvalidResponse(format!("Structured output is not valid JSON: {e}"))
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn native() -> OpenAiCompatClient {
        OpenAiCompatClient::openai("sk-test", "gpt-4o").unwrap()
    }

    fn emulated() -> OpenAiCompatClient {
        OpenAiCompatClient::ollama(None, "llama3").unwrap()
    }

    fn act_tools() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "performAction".into(),
            description: "Perform a browser action".into(),
            parameters: json!({"type": "object"}),
        }]
    }

    #[test]
    fn constructors() {
        let client = emulated();
        assert_eq!(client.name(), "ollama");
        assert!(client.base_url.contains("localhost:11434"));
        assert_eq!(client.capabilities().tool_protocol, ToolProtocol::TextEmulated);
        assert_eq!(native().capabilities().tool_protocol, ToolProtocol::Native);
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You automate browsers"), Message::user("Hello")];
        let api_messages = OpenAiCompatClient::to_api_messages(&messages, None);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].content, Some(json!("Hello")));
    }

    #[test]
    fn image_attaches_to_last_user_message() {
        let messages = vec![
            Message::system("sys"),
            Message::user("first"),
            Message::user("look at this"),
        ];
        let image = ImageAttachment {
            buffer: vec![0x89, b'P', b'N', b'G'],
            description: Some("Full-page screenshot".into()),
        };
        let api = OpenAiCompatClient::to_api_messages(&messages, Some(&image));

        assert_eq!(api[1].content, Some(json!("first")));
        let parts = api[2].content.as_ref().unwrap().as_array().unwrap();
        assert_eq!(parts[0]["text"], "look at this");
        assert_eq!(parts[1]["text"], "Full-page screenshot");
        let url = parts[2]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn jpeg_is_detected() {
        let url = OpenAiCompatClient::data_url(&[0xFF, 0xD8, 0xFF, 0xE0]);
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn native_body_carries_tools_and_sampling() {
        let client = native();
        let request = ChatCompletionRequest::new(vec![Message::user("click login")], "req-1")
            .with_tools(act_tools(), ToolChoice::Required)
            .with_temperature(0.1);
        let body = client.chat_body(&request);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["tools"][0]["function"]["name"], "performAction");
        assert_eq!(body["top_p"], 1.0);
        assert_eq!(body["frequency_penalty"], 0.0);
    }

    #[test]
    fn specific_tool_choice() {
        let value = OpenAiCompatClient::to_api_tool_choice(&ToolChoice::Tool("skipSection".into()));
        assert_eq!(value["function"]["name"], "skipSection");
    }

    #[test]
    fn emulated_body_renders_catalogue_instead_of_tools() {
        let client = emulated();
        let request = ChatCompletionRequest::new(vec![Message::user("click login")], "req-1")
            .with_tools(act_tools(), ToolChoice::Required);
        let body = client.chat_body(&request);

        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("performAction"));
    }

    #[test]
    fn request_model_overrides_default() {
        let client = native();
        let request = ChatCompletionRequest::new(vec![Message::user("x")], "r")
            .with_model(Some("gpt-4o-mini".into()));
        assert_eq!(client.chat_body(&request)["model"], "gpt-4o-mini");
    }

    #[test]
    fn structured_body_uses_json_schema() {
        let client = native();
        let schema = json!({"type": "object", "properties": {"title": {"type": "string"}}});
        let request = StructuredObjectRequest::new(vec![Message::user("extract")], schema.clone(), "r");
        let body = client.structured_body(&request);

        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["schema"], schema);
        assert_eq!(body["temperature"], json!(0.1f32));
    }

    #[test]
    fn parse_response_with_tool_call() {
        let data = r#"{
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": null,
                "tool_calls": [{"id": "call_1", "type": "function",
                    "function": {"name": "performAction", "arguments": "{\"method\":\"click\"}"}}]}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let (choice, usage) = OpenAiCompatClient::first_choice(parsed).unwrap();
        assert_eq!(usage.unwrap().total_tokens, 15);
        let calls = choice.message.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "performAction");
    }

    #[test]
    fn empty_choices_is_invalid_response() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = OpenAiCompatClient::first_choice(parsed).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn content_text_joins_parts() {
        let parts = json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]);
        assert_eq!(OpenAiCompatClient::content_text(Some(parts)), "ab");
        assert_eq!(OpenAiCompatClient::content_text(None), "");
    }
}
