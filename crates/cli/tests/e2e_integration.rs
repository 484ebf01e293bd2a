//! End-to-end tests for the Stepwright inference pipeline.
//!
//! These exercise the full path from a JSON plan through the executor,
//! the inference engines, the LLM response cache and the action cache,
//! down to a recording page driver.

use std::sync::{Arc, Mutex};

use serde_json::json;
use stepwright_cache::{
    CachingLlmClient, ContentAddressableCache, EvictionPolicy, FileBackend, InMemoryBackend,
};
use stepwright_config::InferenceConfig;
use stepwright_core::cache::{CacheKind, CacheStore};
use stepwright_core::error::{PageError, ProviderError};
use stepwright_core::event::{EventBus, InferenceEvent};
use stepwright_core::message::MessageToolCall;
use stepwright_core::outcome::{Action, Assertion};
use stepwright_core::page::PageDriver;
use stepwright_core::provider::{
    ChatCompletionRequest, ChatCompletionResponse, LlmClient, ModelCapabilities,
    StructuredObjectRequest, Usage,
};
use stepwright_executor::{ExecutionContext, StepExecutor, default_registry, parse_plan};
use stepwright_inference::Engines;
use stepwright_security::Variables;

// ── Mock collaborators ───────────────────────────────────────────────────

/// A mock client that returns scripted replies in sequence.
struct ScriptedClient {
    chat: Mutex<Vec<ChatCompletionResponse>>,
    objects: Mutex<Vec<serde_json::Value>>,
    call_count: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(chat: Vec<ChatCompletionResponse>, objects: Vec<serde_json::Value>) -> Self {
        Self {
            chat: Mutex::new(chat.into_iter().rev().collect()),
            objects: Mutex::new(objects.into_iter().rev().collect()),
            call_count: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    fn everything_sent(&self) -> String {
        self.prompts.lock().unwrap().join("\n")
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::negotiate(true, true)
    }

    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        *self.call_count.lock().unwrap() += 1;
        self.prompts
            .lock()
            .unwrap()
            .push(serde_json::to_string(&request.messages).unwrap());
        let reply = self.chat.lock().unwrap().pop();
        Ok(reply.unwrap_or_else(|| panic!("ScriptedClient exhausted: call #{}", self.calls())))
    }

    async fn generate_structured_object(
        &self,
        request: StructuredObjectRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        *self.call_count.lock().unwrap() += 1;
        self.prompts
            .lock()
            .unwrap()
            .push(serde_json::to_string(&request.messages).unwrap());
        let reply = self.objects.lock().unwrap().pop();
        Ok(reply.unwrap_or_else(|| panic!("ScriptedClient exhausted: call #{}", self.calls())))
    }
}

fn tool_response(name: &str, args: serde_json::Value) -> ChatCompletionResponse {
    ChatCompletionResponse {
        content: String::new(),
        tool_calls: vec![MessageToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: serde_json::to_string(&args).unwrap(),
        }],
        usage: Some(Usage {
            prompt_tokens: 120,
            completion_tokens: 30,
            total_tokens: 150,
        }),
    }
}

fn text_response(text: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        content: text.into(),
        tool_calls: vec![],
        usage: None,
    }
}

/// A page that serves one DOM and records actions.
struct RecordingPage {
    dom: String,
    performed: Mutex<Vec<Action>>,
}

impl RecordingPage {
    fn new(dom: &str) -> Self {
        Self {
            dom: dom.into(),
            performed: Mutex::new(Vec::new()),
        }
    }

    fn performed(&self) -> Vec<Action> {
        self.performed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PageDriver for RecordingPage {
    async fn dom_snapshot(&self) -> Result<String, PageError> {
        Ok(self.dom.clone())
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>, PageError> {
        Err(PageError::ScreenshotFailed("headless snapshot".into()))
    }

    async fn perform(&self, action: &Action, _settle: Option<u64>) -> Result<(), PageError> {
        self.performed.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn verify(&self, assertion: &Assertion) -> Result<bool, PageError> {
        Ok(assertion
            .value
            .as_deref()
            .is_none_or(|v| self.dom.contains(v)))
    }
}

const LOGIN_DOM: &str = r#"<form>
  <input ref="e1" name="username">
  <input ref="e2" name="password" type="password">
  <button ref="e3">Sign in</button>
</form>
<p ref="e4">Welcome back, alice</p>"#;

const LOGIN_PLAN: &str = r#"[
  {"type": "act", "params": {"instruction": "Type {{USERNAME}} into the username field"}},
  {"type": "act", "params": {"instruction": "Type the password"}},
  {"type": "act", "params": {"instruction": "Click sign in", "settle_timeout_ms": 500}},
  {"type": "assert", "params": {"instruction": "The greeting mentions the user"}}
]"#;

fn login_script() -> Vec<ChatCompletionResponse> {
    vec![
        tool_response(
            "performAction",
            json!({"method": "fill", "target_element_ref": "e1", "args": ["{{USERNAME}}"],
                   "step_description": "Fill username"}),
        ),
        tool_response(
            "performAction",
            json!({"method": "fill", "target_element_ref": "e2", "args": ["{{PASSWORD}}"],
                   "step_description": "Fill password"}),
        ),
        tool_response(
            "performAction",
            json!({"method": "click", "target_element_ref": "e3", "completed": true,
                   "step_description": "Click sign in"}),
        ),
        tool_response(
            "performAssertion",
            json!({"method": "toContainText", "target_element_ref": "e4", "value": "{{USERNAME}}",
                   "step_description": "Greeting names the user"}),
        ),
    ]
}

fn login_vars() -> Variables {
    let mut vars = Variables::new();
    vars.insert("USERNAME".into(), "alice".into());
    vars.insert("PASSWORD".into(), "p@ss!".into());
    vars
}

struct Harness {
    executor: StepExecutor,
    events: Arc<EventBus>,
}

fn harness(client: Arc<dyn LlmClient>, store: Option<Arc<dyn CacheStore>>) -> Harness {
    let events = Arc::new(EventBus::new(1024));
    let (client, actions) = match store {
        Some(store) => {
            let llm = Arc::new(
                ContentAddressableCache::new(store.clone(), CacheKind::Llm, EvictionPolicy::default())
                    .with_events(events.clone()),
            );
            let actions = Arc::new(
                ContentAddressableCache::new(store, CacheKind::Actions, EvictionPolicy::default())
                    .with_events(events.clone()),
            );
            (Arc::new(CachingLlmClient::new(client, llm)) as Arc<dyn LlmClient>, Some(actions))
        }
        None => (client, None),
    };
    let engines = Engines::new(client, &InferenceConfig::default(), None, Some(events.clone()));
    Harness {
        executor: StepExecutor::new(default_registry(engines, actions)),
        events,
    }
}

// ── E2E: Login flow ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_login_plan_resolves_secrets_only_at_the_page() {
    let client = Arc::new(ScriptedClient::new(login_script(), vec![]));
    let h = harness(client.clone(), None);
    let page = Arc::new(RecordingPage::new(LOGIN_DOM));
    let mut ctx = ExecutionContext::new(page.clone(), login_vars(), h.events.clone());

    let plan = parse_plan(LOGIN_PLAN).unwrap();
    let results = h.executor.run(&plan, &mut ctx).await;

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.success), "{results:?}");

    let performed = page.performed();
    assert_eq!(performed[0].args, vec!["alice".to_string()]);
    assert_eq!(performed[1].args, vec!["p@ss!".to_string()]);
    assert_eq!(performed[2].method, "click");

    // Values never reach the model or the step output
    let sent = client.everything_sent();
    assert!(sent.contains("{{PASSWORD}}"));
    assert!(!sent.contains("p@ss!"));
    let output = serde_json::to_string(&results).unwrap();
    assert!(!output.contains("p@ss!"));

    // Prior steps are narrated back to later act calls
    assert!(sent.contains("1. Fill username"));
    assert_eq!(
        ctx.narrative,
        vec![
            "Fill username",
            "Fill password",
            "Click sign in",
            "Verified: Greeting names the user"
        ]
    );
}

// ── E2E: Caching ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_second_run_is_served_from_cache() {
    let client = Arc::new(ScriptedClient::new(login_script(), vec![]));
    let store: Arc<dyn CacheStore> = Arc::new(InMemoryBackend::new());
    let h = harness(client.clone(), Some(store));
    let plan = parse_plan(LOGIN_PLAN).unwrap();

    let page = Arc::new(RecordingPage::new(LOGIN_DOM));
    let mut first = ExecutionContext::new(page.clone(), login_vars(), h.events.clone());
    let results = h.executor.run(&plan, &mut first).await;
    assert!(results.iter().all(|r| r.success));
    assert_eq!(client.calls(), 4);

    let mut rx = h.events.subscribe();
    let mut second = ExecutionContext::new(page.clone(), login_vars(), h.events.clone());
    let results = h.executor.run(&plan, &mut second).await;
    assert!(results.iter().all(|r| r.success), "{results:?}");

    // Nothing new reached the model
    assert_eq!(client.calls(), 4);
    assert_eq!(page.performed().len(), 6);
    assert_eq!(page.performed()[4].args, vec!["p@ss!".to_string()]);

    let mut hits = 0;
    while let Ok(event) = rx.try_recv() {
        if let InferenceEvent::CacheLookup { hit: true, .. } = event.as_ref() {
            hits += 1;
        }
    }
    assert_eq!(hits, 4);
}

#[tokio::test]
async fn e2e_cached_actions_never_store_secret_values() {
    let client = Arc::new(ScriptedClient::new(login_script(), vec![]));
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn CacheStore> = Arc::new(FileBackend::new(dir.path().to_path_buf()));
    let h = harness(client, Some(store));

    let page = Arc::new(RecordingPage::new(LOGIN_DOM));
    let mut ctx = ExecutionContext::new(page, login_vars(), h.events.clone());
    h.executor.run(&parse_plan(LOGIN_PLAN).unwrap(), &mut ctx).await;

    let actions = std::fs::read_to_string(dir.path().join("actions.jsonl")).unwrap();
    let responses = std::fs::read_to_string(dir.path().join("llm.jsonl")).unwrap();
    assert!(actions.contains("{{PASSWORD}}"));
    assert!(!actions.contains("p@ss!"));
    assert!(!responses.contains("p@ss!"));
}

#[tokio::test]
async fn e2e_file_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let plan = parse_plan(LOGIN_PLAN).unwrap();

    {
        let client = Arc::new(ScriptedClient::new(login_script(), vec![]));
        let store: Arc<dyn CacheStore> = Arc::new(FileBackend::new(dir.path().to_path_buf()));
        let h = harness(client.clone(), Some(store));
        let page = Arc::new(RecordingPage::new(LOGIN_DOM));
        let mut ctx = ExecutionContext::new(page, login_vars(), h.events.clone());
        h.executor.run(&plan, &mut ctx).await;
        assert_eq!(client.calls(), 4);
    }

    // A fresh process with an empty script: every step must come from disk
    let client = Arc::new(ScriptedClient::new(vec![], vec![]));
    let store: Arc<dyn CacheStore> = Arc::new(FileBackend::new(dir.path().to_path_buf()));
    let h = harness(client.clone(), Some(store));
    let page = Arc::new(RecordingPage::new(LOGIN_DOM));
    let mut ctx = ExecutionContext::new(page.clone(), login_vars(), h.events.clone());
    let results = h.executor.run(&plan, &mut ctx).await;

    assert!(results.iter().all(|r| r.success), "{results:?}");
    assert_eq!(client.calls(), 0);
    assert_eq!(page.performed().len(), 3);
}

#[tokio::test]
async fn e2e_identical_request_within_one_request_id_is_not_served_twice() {
    let client = Arc::new(ScriptedClient::new(
        vec![text_response("first"), text_response("second")],
        vec![],
    ));
    let store: Arc<dyn CacheStore> = Arc::new(InMemoryBackend::new());
    let cache = Arc::new(ContentAddressableCache::new(
        store,
        CacheKind::Llm,
        EvictionPolicy::default(),
    ));
    let cached = CachingLlmClient::new(client.clone(), cache);

    let request = |id: &str| {
        ChatCompletionRequest::new(
            vec![stepwright_core::message::Message::user("hello")],
            id,
        )
    };

    let a1 = cached.create_chat_completion(request("A")).await.unwrap();
    let a2 = cached.create_chat_completion(request("A")).await.unwrap();
    let b1 = cached.create_chat_completion(request("B")).await.unwrap();

    assert_eq!(a1.content, "first");
    assert_eq!(a2.content, "second");
    assert_eq!(b1.content, "second");
    assert_eq!(client.calls(), 2);
}

// ── E2E: Degraded model behaviour ────────────────────────────────────────

#[tokio::test]
async fn e2e_chatty_model_skips_optional_step_and_plan_continues() {
    let client = Arc::new(ScriptedClient::new(
        vec![
            text_response("I think you should click the cookie banner."),
            text_response("The banner is at the top."),
            text_response("Honestly not sure."),
            tool_response(
                "performAction",
                json!({"method": "click", "target_element_ref": "e3", "step_description": "Click sign in"}),
            ),
        ],
        vec![],
    ));
    let h = harness(client.clone(), None);
    let page = Arc::new(RecordingPage::new(LOGIN_DOM));
    let mut ctx = ExecutionContext::new(page.clone(), Variables::new(), h.events.clone());

    let plan = parse_plan(
        r#"[
          {"type": "act", "params": {"instruction": "Dismiss the cookie banner"}, "optional": true},
          {"type": "act", "params": {"instruction": "Click sign in"}}
        ]"#,
    )
    .unwrap();
    let results = h.executor.run(&plan, &mut ctx).await;

    assert_eq!(client.calls(), 4);
    assert_eq!(results[0].output, Some(json!({"skipped": true})));
    assert!(results[1].success);
    assert_eq!(page.performed().len(), 1);
}

#[tokio::test]
async fn e2e_extract_then_discover() {
    let client = Arc::new(ScriptedClient::new(
        vec![],
        vec![
            json!({"greeting": "Welcome back, alice"}),
            json!({"greeting": "Welcome back, alice"}),
            json!({"progress": "greeting captured", "completed": true}),
            json!({"objectives": [
                {"title": "Sign in with valid credentials", "description": "Log in and confirm the greeting appears",
                 "priority": "high", "category": "functional", "complexity": "simple"},
                {"title": "Password field masks input", "description": "The password input uses type=password",
                 "priority": "medium", "category": "security", "complexity": "simple"}
            ]}),
        ],
    ));
    let h = harness(client, None);
    let page = Arc::new(RecordingPage::new(LOGIN_DOM));
    let mut ctx = ExecutionContext::new(page, Variables::new(), h.events.clone());

    let plan = parse_plan(
        r#"[
          {"type": "extract", "params": {"instruction": "Get the greeting",
            "schema": {"type": "object", "properties": {"greeting": {"type": "string"}}, "required": ["greeting"]}}},
          {"type": "discover", "params": {}}
        ]"#,
    )
    .unwrap();
    let results = h.executor.run(&plan, &mut ctx).await;

    let extracted = results[0].output.as_ref().unwrap();
    assert_eq!(extracted["greeting"], "Welcome back, alice");
    assert_eq!(extracted["metadata"]["completed"], true);

    // The screenshot failed, so discovery ran on the DOM alone
    let objectives = results[1].output.as_ref().unwrap().as_array().unwrap();
    assert_eq!(objectives.len(), 2);
    assert_eq!(objectives[0]["priority"], "high");
}
