//! Prompt for listing the elements relevant to an instruction.

use serde_json::json;
use stepwright_core::message::Message;
use stepwright_core::provider::{ModelCapabilities, ToolDefinition};

use super::{render_context, skip_section_tool, tool_call_reminder};
use crate::request::InferenceRequest;

pub const REPORT_ELEMENTS: &str = "reportElements";

const SYSTEM: &str = "You inspect web pages for a test author. Given an instruction and the \
current page, report the elements that matter for it, most relevant first. Suggest an \
interaction method when one is obvious. If nothing on the page is relevant, call skipSection.";

pub fn report_elements_tool() -> ToolDefinition {
    ToolDefinition {
        name: REPORT_ELEMENTS.into(),
        description: "Report relevant elements in rank order.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "elements": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "element_ref": {"type": "string"},
                            "description": {"type": "string"},
                            "method": {"type": "string"},
                            "args": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["element_ref", "description"]
                    }
                }
            },
            "required": ["elements"]
        }),
    }
}

pub fn tools() -> Vec<ToolDefinition> {
    vec![report_elements_tool(), skip_section_tool()]
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
