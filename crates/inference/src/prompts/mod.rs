//! Prompt builders.
//!
//! Each builder renders the messages (and tool definitions or JSON schema)
//! for one operation. Wording may depend on [`ModelCapabilities`], never on
//! the model's name.

pub mod act;
pub mod assert;
pub mod discover;
pub mod extract;
pub mod observe;
pub mod visual_check;

use serde_json::json;
use stepwright_core::provider::{ModelCapabilities, ToolDefinition, ToolProtocol};

use crate::request::InferenceRequest;

pub const SKIP_SECTION: &str = "skipSection";

/// The explicit no-op tool offered alongside every tool-calling operation.
pub fn skip_section_tool() -> ToolDefinition {
    ToolDefinition {
        name: SKIP_SECTION.into(),
        description: "Call this when the instruction does not apply to the current page \
                      and nothing should be done."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "reason": {"type": "string", "description": "Why nothing applies"}
            },
            "required": ["reason"]
        }),
    }
}

/// Shared user-prompt body: instruction, history, variables, DOM.
pub(crate) fn render_context(request: &InferenceRequest) -> String {
    let mut out = format!("Instruction:\n{}\n", request.instruction.trim());

    if !request.prior_steps.is_empty() {
        out.push_str("\nSteps already taken:\n");
        for (i, step) in request.prior_steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step));
        }
    }

    let placeholders = request.variable_placeholders();
    if !placeholders.is_empty() {
        out.push_str(&format!(
            "\nAvailable variables: {}\n\
             When a value is needed, write the placeholder exactly as shown. \
             Never guess or invent the value.\n",
            placeholders.join(", ")
        ));
    }

    out.push_str(&format!("\nDOM snapshot:\n{}\n", request.dom_snapshot));
    out
}

/// Closing line for tool-calling prompts, tuned to how tools reach the model.
pub(crate) fn tool_call_reminder(caps: &ModelCapabilities) -> &'static str {
    match caps.tool_protocol {
        ToolProtocol::Native => "Respond by calling exactly one tool.",
        ToolProtocol::TextEmulated => {
            "Respond with exactly one <tool_call> block and nothing else. \
             Do not explain your answer."
        }
    }
}

/// Sent on act retries after a reply without a tool call.
pub const RETRY_NUDGE: &str =
    "Your previous reply did not call a tool. Call exactly one of the provided tools now.";
