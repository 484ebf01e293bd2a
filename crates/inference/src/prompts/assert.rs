//! Prompt for turning an instruction into one assertion.

use serde_json::json;
use stepwright_core::message::Message;
use stepwright_core::provider::{ModelCapabilities, ToolDefinition};

use super::{render_context, skip_section_tool, tool_call_reminder};
use crate::request::InferenceRequest;

pub const PERFORM_ASSERTION: &str = "performAssertion";

pub const ASSERTION_METHODS: &[&str] = &[
    "toBeVisible", "toBeHidden", "toHaveText", "toContainText", "toHaveValue", "toBeChecked",
    "toBeEnabled", "toBeDisabled", "toHaveAttribute", "toHaveCount",
];

/// Matchers that compare against an expected value.
pub const VALUE_METHODS: &[&str] = &[
    "toHaveText", "toContainText", "toHaveValue", "toHaveAttribute", "toHaveCount",
];

const SYSTEM: &str = "You are a browser test verifier. Given one validation instruction and \
the current page, choose the single assertion that checks it.

Rules:
- Target elements by the reference shown in the DOM snapshot.
- Use only the listed matchers; text and value matchers need `value`.
- If the instruction does not apply to this page, call skipSection.";

pub fn perform_assertion_tool() -> ToolDefinition {
    ToolDefinition {
        name: PERFORM_ASSERTION.into(),
        description: "Assert a condition on a page element.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "method": {"type": "string", "enum": ASSERTION_METHODS},
                "target_element_ref": {"type": "string"},
                "value": {"type": "string", "description": "Expected value for value-bearing matchers"},
                "completed": {"type": "boolean"},
                "step_description": {"type": "string"},
                "rationale": {"type": "string"},
                "target_path": {"type": "string"}
            },
            "required": ["method", "target_element_ref", "completed", "step_description"]
        }),
    }
}

pub fn tools() -> Vec<ToolDefinition> {
    vec![perform_assertion_tool(), skip_section_tool()]
}

pub fn messages(request: &InferenceRequest, caps: &ModelCapabilities) -> Vec<Message> {
    vec![
        Message::system(SYSTEM),
        Message::user(format!(
            "{}\n{}",
            render_context(request),
            tool_call_reminder(caps)
        )),
    ]
}
