//! Text-emulated tool calling for models without a native tools API.
//!
//! The tool catalogue is rendered into the system prompt and the model is
//! asked to answer with a block like:
//!
//! ```text
//! <tool_call>{"name": "performAction", "arguments": {"method": "click"}}</tool_call>
//! ```
//!
//! Replies are scanned for those blocks and turned back into
//! [`MessageToolCall`]s, so callers see the same shape as a native reply.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Deserialize;
use stepwright_core::message::{Message, MessageToolCall, Role};
use stepwright_core::provider::{ToolChoice, ToolDefinition};
use tracing::warn;

static TOOL_CALL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_call>\s*(.*?)\s*</tool_call>").expect("tool call pattern compiles")
});

#[derive(Debug, Deserialize)]
struct EmulatedCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// The system-prompt section describing the available tools.
pub fn render_tool_catalogue(tools: &[ToolDefinition], choice: &ToolChoice) -> String {
    let mut out = String::from("# Tools\n\nYou can call the following tools:\n");
    for tool in tools {
        let params = serde_json::to_string(&tool.parameters).unwrap_or_else(|_| "{}".into());
        out.push_str(&format!(
            "\n## {}\n{}\nParameters (JSON Schema): {}\n",
            tool.name, tool.description, params
        ));
    }

    out.push_str(
        "\nTo call a tool, reply with exactly one block of the form\n\
         <tool_call>{\"name\": \"<tool name>\", \"arguments\": { ... }}</tool_call>\n\
         with arguments that satisfy the tool's schema. Do not wrap it in code fences.\n",
    );

    match choice {
        ToolChoice::Required => {
            out.push_str("You MUST call exactly one tool. Do not answer in prose.\n");
        }
        ToolChoice::Tool(name) => {
            out.push_str(&format!("You MUST call the `{name}` tool.\n"));
        }
        ToolChoice::None => {
            out.push_str("Do not call any tool for this reply.\n");
        }
        ToolChoice::Auto => {}
    }
    out
}

/// Rewrite a conversation for a model that only understands plain text.
///
/// The catalogue is appended to the first system message, or becomes one.
/// Every other message passes through unchanged.
pub fn encode_messages(
    messages: &[Message],
    tools: &[ToolDefinition],
    choice: &ToolChoice,
) -> Vec<Message> {
    let catalogue = render_tool_catalogue(tools, choice);
    let mut out: Vec<Message> = Vec::with_capacity(messages.len() + 1);
    let mut catalogue_placed = false;

    for msg in messages {
        match msg.role {
            Role::System if !catalogue_placed => {
                out.push(Message::system(format!("{}\n\n{catalogue}", msg.content)));
                catalogue_placed = true;
            }
            _ => out.push(msg.clone()),
        }
    }

    if !catalogue_placed {
        out.insert(0, Message::system(catalogue));
    }
    out
}

/// Pull `<tool_call>` blocks out of a reply.
///
/// Returns the remaining prose and the parsed calls in order. Blocks that are
/// not valid JSON with a `name` are dropped with a warning; when nothing
/// parses the caller sees an empty list, the same as a native reply without
/// a tool call.
pub fn decode_reply(content: &str) -> (String, Vec<MessageToolCall>) {
    let mut calls = Vec::new();

    for (i, caps) in TOOL_CALL_BLOCK.captures_iter(content).enumerate() {
        let body = strip_code_fence(&caps[1]);
        match serde_json::from_str::<EmulatedCall>(body) {
            Ok(call) => {
                let arguments = match call.arguments {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => "{}".to_string(),
                    other => other.to_string(),
                };
                calls.push(MessageToolCall {
                    id: format!("call_{i}"),
                    name: call.name,
                    arguments,
                });
            }
            Err(e) => warn!(error = %e, "Ignoring malformed <tool_call> block"),
        }
    }

    let prose = TOOL_CALL_BLOCK.replace_all(content, "").trim().to_string();
    (prose, calls)
}

/// Strip a surrounding Markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
