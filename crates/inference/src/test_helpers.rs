//! Shared test helpers for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use stepwright_core::error::ProviderError;
use stepwright_core::message::MessageToolCall;
use stepwright_core::provider::{
    ChatCompletionRequest, ChatCompletionResponse, LlmClient, ModelCapabilities,
    StructuredObjectRequest, Usage,
};

/// A mock client that returns scripted replies in order.
///
/// Chat completions and structured objects have separate queues. Every
/// request is recorded for inspection. Panics if more calls are made than
/// replies provided.
pub struct SequentialMockClient {
    chat: Mutex<VecDeque<Result<ChatCompletionResponse, ProviderError>>>,
    objects: Mutex<VecDeque<Result<serde_json::Value, ProviderError>>>,
    capabilities: ModelCapabilities,
    pub chat_requests: Mutex<Vec<ChatCompletionRequest>>,
    pub structured_requests: Mutex<Vec<StructuredObjectRequest>>,
}

impl SequentialMockClient {
    pub fn new() -> Self {
        Self {
            chat: Mutex::new(VecDeque::new()),
            objects: Mutex::new(VecDeque::new()),
            capabilities: ModelCapabilities::negotiate(true, true),
            chat_requests: Mutex::new(Vec::new()),
            structured_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn chat(self, response: ChatCompletionResponse) -> Self {
        self.chat.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn chat_error(self, error: ProviderError) -> Self {
        self.chat.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn object(self, value: serde_json::Value) -> Self {
        self.objects.lock().unwrap().push_back(Ok(value));
        self
    }

    pub fn object_error(self, error: ProviderError) -> Self {
        self.objects.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_requests.lock().unwrap().len()
    }

    pub fn structured_calls(&self) -> usize {
        self.structured_requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for SequentialMockClient {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        let call = self.chat_calls();
        self.chat_requests.lock().unwrap().push(request);
        self.chat
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("SequentialMockClient: no more chat replies (call #{call})"))
    }

    async fn generate_structured_object(
        &self,
        request: StructuredObjectRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let call = self.structured_calls();
        self.structured_requests.lock().unwrap().push(request);
        self.objects
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("SequentialMockClient: no more object replies (call #{call})"))
    }
}

/// A reply in prose, with no tool call.
pub fn make_text_response(text: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        content: text.into(),
        tool_calls: vec![],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

/// A reply selecting one tool.
pub fn make_tool_response(name: &str, args: serde_json::Value) -> ChatCompletionResponse {
    ChatCompletionResponse {
        content: String::new(),
        tool_calls: vec![make_tool_call(name, args)],
        usage: None,
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
