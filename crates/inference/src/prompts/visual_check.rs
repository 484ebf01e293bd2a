//! Prompt and schema for a yes/no question about a screenshot.

use serde_json::{Value, json};
use stepwright_core::message::Message;

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "passed": {"type": "boolean", "description": "True if the screenshot satisfies the check"},
            "reasoning": {"type": "string", "description": "What in the screenshot led to the verdict"}
        },
        "required": ["passed", "reasoning"]
    })
}

pub fn messages(prompt: &str) -> Vec<Message> {
    vec![
        Message::system(
            "You verify web pages visually. Answer strictly from the attached screenshot. \
             When unsure, the check fails.",
        ),
        Message::user(format!("Check: {prompt}")),
    ]
}
