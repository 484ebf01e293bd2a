//! Scripted collaborators for executor tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use stepwright_core::error::{PageError, ProviderError};
use stepwright_core::message::MessageToolCall;
use stepwright_core::outcome::{Action, Assertion};
use stepwright_core::page::PageDriver;
use stepwright_core::provider::{
    ChatCompletionRequest, ChatCompletionResponse, LlmClient, ModelCapabilities,
    StructuredObjectRequest,
};

/// Replays chat replies and structured objects in order.
pub struct ScriptedClient {
    chat: Mutex<VecDeque<ChatCompletionResponse>>,
    objects: Mutex<VecDeque<serde_json::Value>>,
    request_ids: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            chat: Mutex::new(VecDeque::new()),
            objects: Mutex::new(VecDeque::new()),
            request_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn chat(self, response: ChatCompletionResponse) -> Self {
        self.chat.lock().unwrap().push_back(response);
        self
    }

    pub fn object(self, value: serde_json::Value) -> Self {
        self.objects.lock().unwrap().push_back(value);
        self
    }

    pub fn calls(&self) -> usize {
        self.request_ids.lock().unwrap().len()
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.request_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::negotiate(true, true)
    }

    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        self.request_ids.lock().unwrap().push(request.request_id);
        self.chat
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))
    }

    async fn generate_structured_object(
        &self,
        request: StructuredObjectRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        self.request_ids.lock().unwrap().push(request.request_id);
        self.objects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))
    }
}

pub fn tool_reply(name: &str, args: serde_json::Value) -> ChatCompletionResponse {
    ChatCompletionResponse {
        content: String::new(),
        tool_calls: vec![MessageToolCall {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: args.to_string(),
        }],
        usage: None,
    }
}

/// A page that serves a fixed DOM and records what it is asked to do.
pub struct RecordingPage {
    dom: String,
    performed: Mutex<Vec<Action>>,
    fail_perform: bool,
    verify_result: bool,
}

impl RecordingPage {
    pub fn new(dom: &str) -> Self {
        Self {
            dom: dom.into(),
            performed: Mutex::new(Vec::new()),
            fail_perform: false,
            verify_result: true,
        }
    }

    pub fn failing_perform(mut self) -> Self {
        self.fail_perform = true;
        self
    }

    pub fn verify_result(mut self, result: bool) -> Self {
        self.verify_result = result;
        self
    }

    pub fn performed(&self) -> Vec<Action> {
        self.performed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageDriver for RecordingPage {
    async fn dom_snapshot(&self) -> Result<String, PageError> {
        Ok(self.dom.clone())
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>, PageError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn perform(&self, action: &Action, _settle_timeout_ms: Option<u64>) -> Result<(), PageError> {
        if self.fail_perform {
            return Err(PageError::ActionFailed {
                method: action.method.clone(),
                target: action.target_element_ref.clone(),
                reason: format!("input rejected '{}'", action.args.join(" ")),
            });
        }
        self.performed.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn verify(&self, _assertion: &Assertion) -> Result<bool, PageError> {
        Ok(self.verify_result)
    }
}
