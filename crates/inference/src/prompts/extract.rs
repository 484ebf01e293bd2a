//! Prompts for the three extraction stages.

use serde_json::{Value, json};
use stepwright_core::message::Message;
use stepwright_core::provider::{ModelCapabilities, ToolProtocol};

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Extra guidance for models that lack native structured output.
fn json_only_footer(schema: &Value, caps: &ModelCapabilities) -> String {
    match caps.tool_protocol {
        ToolProtocol::Native => String::new(),
        ToolProtocol::TextEmulated => format!(
            "\n\nReply with a single JSON value and nothing else: no prose, no code fences. \
             It must satisfy this JSON Schema:\n{}",
            pretty(schema)
        ),
    }
}

/// How to read a DOM chunk, by capability class.
fn reading_hint(caps: &ModelCapabilities) -> &'static str {
    if caps.is_vision_capable {
        "No screenshot accompanies this chunk. Do not infer values from layout or \
         styling; take them only from element text and attributes."
    } else {
        "Take values from element text and attribute values. Ignore tags, scripts and \
         styles that carry no data."
    }
}

pub fn raw_messages(
    instruction: &str,
    schema: &Value,
    dom_chunk: &str,
    caps: &ModelCapabilities,
) -> Vec<Message> {
    let system = format!(
        "You extract structured data from web page content. Extract only what the \
         content shows; leave out anything you cannot find rather than guessing. {}",
        reading_hint(caps)
    );
    let user = format!(
        "Instruction:\n{instruction}\n\nPage content:\n{dom_chunk}{}",
        json_only_footer(schema, caps)
    );
    vec![Message::system(system), Message::user(user)]
}

pub fn refine_messages(
    instruction: &str,
    schema: &Value,
    previous: &Value,
    raw: &Value,
    caps: &ModelCapabilities,
) -> Vec<Message> {
    let system = "You merge partial extraction results into one object. Keep every value \
                  already confirmed in the previous result, add new values from the latest \
                  extraction, and drop duplicates.";
    let user = format!(
        "Instruction:\n{instruction}\n\nPreviously extracted:\n{}\n\nNewly extracted:\n{}{}",
        pretty(previous),
        pretty(raw),
        json_only_footer(schema, caps)
    );
    vec![Message::system(system), Message::user(user)]
}

pub fn metadata_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "progress": {"type": "string", "description": "What has been extracted so far and what remains"},
            "completed": {"type": "boolean", "description": "True only if the instruction is fully satisfied"}
        },
        "required": ["progress", "completed"]
    })
}

pub fn metadata_messages(
    instruction: &str,
    extracted: &Value,
    chunks_seen: usize,
    chunks_total: usize,
    prior_progress: &str,
    caps: &ModelCapabilities,
) -> Vec<Message> {
    let system = "You judge whether a data extraction task is finished. Decide from the \
                  instruction and the data, not from how much of the page has been read.";
    let mut user = format!(
        "Instruction:\n{instruction}\n\nExtracted so far:\n{}\n\nChunks processed: {chunks_seen} of {chunks_total}.",
        pretty(extracted)
    );
    if !prior_progress.is_empty() {
        user.push_str(&format!("\nPrevious progress note: {prior_progress}"));
    }
    user.push_str(&json_only_footer(&metadata_schema(), caps));
    vec![Message::system(system), Message::user(user)]
}
