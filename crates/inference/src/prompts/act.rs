//! Prompt for turning an instruction into one browser action.

use serde_json::json;
use stepwright_core::message::Message;
use stepwright_core::provider::{ModelCapabilities, ToolDefinition};

use super::{render_context, skip_section_tool, tool_call_reminder};
use crate::request::InferenceRequest;

pub const PERFORM_ACTION: &str = "performAction";

/// Interaction methods the page driver understands.
pub const ACTION_METHODS: &[&str] = &[
    "click", "dblclick", "fill", "type", "press", "selectOption", "check", "uncheck", "hover",
    "scrollTo", "goto", "wait",
];

const SYSTEM: &str = "You are a browser automation engine. Given one test instruction and \
the current page, choose the single next action that moves the instruction forward.

Rules:
- Target elements by the reference shown in the DOM snapshot.
- Use only the listed methods.
- Set `completed` to true only when this action finishes the whole instruction.
- If the instruction does not apply to this page, call skipSection.";

pub fn perform_action_tool() -> ToolDefinition {
    ToolDefinition {
        name: PERFORM_ACTION.into(),
        description: "Perform one interaction on a page element.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "method": {"type": "string", "enum": ACTION_METHODS},
                "target_element_ref": {"type": "string", "description": "Element reference from the DOM snapshot"},
                "args": {"type": "array", "items": {"type": "string"}, "description": "Method arguments, e.g. text to fill"},
                "completed": {"type": "boolean", "description": "True if this action completes the instruction"},
                "step_description": {"type": "string", "description": "One line describing the action"},
                "rationale": {"type": "string"},
                "target_path": {"type": "string", "description": "XPath or CSS path of the target, if known"}
            },
            "required": ["method", "target_element_ref", "args", "completed", "step_description"]
        }),
    }
}

pub fn tools() -> Vec<ToolDefinition> {
    vec![perform_action_tool(), skip_section_tool()]
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
