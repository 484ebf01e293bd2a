//! Prompt and schema for proposing test objectives.

use serde_json::{Value, json};
use stepwright_core::message::Message;
use stepwright_core::outcome::TestObjective;

pub fn schema(max_objectives: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "objectives": {
                "type": "array",
                "minItems": 1,
                "maxItems": max_objectives,
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "minLength": TestObjective::TITLE_CHARS.start(),
                            "maxLength": TestObjective::TITLE_CHARS.end()
                        },
                        "description": {
                            "type": "string",
                            "minLength": TestObjective::DESCRIPTION_CHARS.start(),
                            "maxLength": TestObjective::DESCRIPTION_CHARS.end()
                        },
                        "priority": {"type": "string", "enum": ["high", "medium", "low"]},
                        "category": {
                            "type": "string",
                            "enum": ["functional", "navigation", "form", "accessibility", "visual", "security"]
                        },
                        "complexity": {"type": "string", "enum": ["simple", "moderate", "complex"]}
                    },
                    "required": ["title", "description", "priority", "category", "complexity"]
                }
            }
        },
        "required": ["objectives"]
    })
}

pub fn messages(dom_snapshot: &str, max_objectives: usize, with_screenshot: bool) -> Vec<Message> {
    let system = "You are a QA lead exploring a web page. Propose the test objectives that \
                  would give the most confidence the page works, most important first.";
    let mut user = format!(
        "Propose between 1 and {max_objectives} test objectives for this page.\n\nDOM snapshot:\n{dom_snapshot}"
    );
    if with_screenshot {
        user.push_str("\n\nA screenshot of the page is attached.");
    }
    vec![Message::system(system), Message::user(user)]
}
