//! Chunked, multi-stage structured extraction.
//!
//! Each chunk goes through three structured calls in order: raw extraction
//! from the chunk alone, refinement against everything extracted so far,
//! and a metadata call in which the model judges progress and completion.
//! The refined object is then merged additively over the previous result so
//! a chunk can add to what was found but never erase it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use stepwright_core::error::InferenceError;
use stepwright_core::event::{EventBus, InferenceEvent};
use stepwright_core::outcome::{ExtractionMetadata, ExtractionResult};
use stepwright_core::provider::{LlmClient, StructuredObjectRequest};
use tracing::{debug, info};

use crate::prompts;
use crate::schema;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_CHARS: usize = 24_000;

/// Where an extraction stands between chunks.
#[derive(Debug, Clone)]
pub struct ExtractionState {
    pub instruction: String,
    pub schema: Value,
    pub previously_extracted_content: Value,
    pub chunks_seen: usize,
    pub chunks_total: usize,
    pub progress: String,
    pub completed: bool,
}

impl ExtractionState {
    pub fn new(instruction: impl Into<String>, schema: Value, chunks_total: usize) -> Self {
        Self {
            instruction: instruction.into(),
            schema,
            previously_extracted_content: Value::Object(Map::new()),
            chunks_seen: 0,
            chunks_total,
            progress: String::new(),
            completed: false,
        }
    }

    /// Fold one chunk's result into the state.
    pub fn absorb(&mut self, result: &ExtractionResult) {
        self.previously_extracted_content = Value::Object(result.data.clone());
        self.progress = result.metadata.progress.clone();
        self.completed = result.metadata.completed;
    }

    /// The state as a final result.
    pub fn to_result(&self) -> ExtractionResult {
        let data = match &self.previously_extracted_content {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        ExtractionResult {
            data,
            metadata: ExtractionMetadata {
                progress: self.progress.clone(),
                completed: self.completed,
            },
        }
    }
}

pub struct ExtractionEngine {
    client: Arc<dyn LlmClient>,
    model: Option<String>,
    temperature: f32,
    chunk_chars: usize,
    events: Option<Arc<EventBus>>,
}

impl ExtractionEngine {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            model: None,
            temperature: 0.1,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            events: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the three stages over one chunk.
    ///
    /// `chunks_seen` counts this chunk. Completion is whatever the model
    /// reports in the metadata stage, regardless of the counters.
    #[allow(clippy::too_many_arguments)]
    pub async fn extract(
        &self,
        instruction: &str,
        previously_extracted_content: &Value,
        dom_chunk: &str,
        schema: &Value,
        chunks_seen: usize,
        chunks_total: usize,
        request_id: &str,
    ) -> Result<ExtractionResult, InferenceError> {
        let mut state = ExtractionState::new(instruction, schema.clone(), chunks_total);
        state.previously_extracted_content = previously_extracted_content.clone();
        state.chunks_seen = chunks_seen;
        self.extract_chunk(&state, dom_chunk, request_id).await
    }

    /// Run the three stages over one chunk, continuing from `state`.
    pub async fn extract_chunk(
        &self,
        state: &ExtractionState,
        dom_chunk: &str,
        request_id: &str,
    ) -> Result<ExtractionResult, InferenceError> {
        let caps = self.client.capabilities();

        // 1. raw extraction from this chunk alone
        let raw = self
            .structured(
                prompts::extract::raw_messages(&state.instruction, &state.schema, dom_chunk, &caps),
                state.schema.clone(),
                request_id,
            )
            .await?;
        schema::validate(&raw, &state.schema)
            .map_err(|e| InferenceError::parse("extract", format!("raw stage: {e}")))?;
        debug!(request_id, chunk = state.chunks_seen, "Raw extraction done");

        // 2. refinement against what earlier chunks produced
        let refined = self
            .structured(
                prompts::extract::refine_messages(
                    &state.instruction,
                    &state.schema,
                    &state.previously_extracted_content,
                    &raw,
                    &caps,
                ),
                state.schema.clone(),
                request_id,
            )
            .await?;
        schema::validate(&refined, &state.schema)
            .map_err(|e| InferenceError::parse("extract", format!("refine stage: {e}")))?;

        let Value::Object(data) = merge_additive(&state.previously_extracted_content, &refined)
        else {
            return Err(InferenceError::parse(
                "extract",
                "extraction schema must describe an object",
            ));
        };
        let merged = Value::Object(data.clone());

        // 3. progress and completion, judged by the model
        let meta = self
            .structured(
                prompts::extract::metadata_messages(
                    &state.instruction,
                    &merged,
                    state.chunks_seen,
                    state.chunks_total,
                    &state.progress,
                    &caps,
                ),
                prompts::extract::metadata_schema(),
                request_id,
            )
            .await?;
        let metadata: ExtractionMetadata = serde_json::from_value(meta)
            .map_err(|e| InferenceError::parse("extract", format!("metadata stage: {e}")))?;

        info!(
            request_id,
            chunks_seen = state.chunks_seen,
            chunks_total = state.chunks_total,
            completed = metadata.completed,
            "Extraction chunk processed"
        );
        if let Some(events) = &self.events {
            events.publish(InferenceEvent::OutcomeResolved {
                operation: "extract".into(),
                request_id: request_id.to_string(),
                skipped: false,
                timestamp: Utc::now(),
            });
        }

        Ok(ExtractionResult { data, metadata })
    }

    /// Chunk `dom` and extract until the model reports completion or the
    /// chunks run out.
    pub async fn extract_all(
        &self,
        instruction: &str,
        schema: &Value,
        dom: &str,
        request_id: &str,
    ) -> Result<ExtractionResult, InferenceError> {
        let chunks = chunk_dom(dom, self.chunk_chars);
        let mut state = ExtractionState::new(instruction, schema.clone(), chunks.len());

        for chunk in &chunks {
            state.chunks_seen += 1;
            let result = self.extract_chunk(&state, chunk, request_id).await?;
            state.absorb(&result);
            if state.completed {
                break;
            }
        }

        Ok(state.to_result())
    }

    async fn structured(
        &self,
        messages: Vec<stepwright_core::message::Message>,
        schema: Value,
        request_id: &str,
    ) -> Result<Value, InferenceError> {
        let request = StructuredObjectRequest::new(messages, schema, request_id)
            .with_temperature(self.temperature)
            .with_model(self.model.clone());
        Ok(self.client.generate_structured_object(request).await?)
    }
}

/// Merge `refined` over `prior` without losing confirmed data.
///
/// Objects merge recursively. Arrays are unioned in order without
/// duplicates, and a prior item is replaced by the first refined item that
/// carries all of its non-null fields. A non-null prior value survives a
/// null or missing refined one. A container is never replaced by a scalar.
pub fn merge_additive(prior: &Value, refined: &Value) -> Value {
    match (prior, refined) {
        (_, Value::Null) => prior.clone(),
        (Value::Null, _) => refined.clone(),
        (Value::Object(p), Value::Object(r)) => {
            let mut out = r.clone();
            for (key, prior_value) in p {
                let merged = match r.get(key) {
                    Some(refined_value) => merge_additive(prior_value, refined_value),
                    None => prior_value.clone(),
                };
                if !merged.is_null() {
                    out.insert(key.clone(), merged);
                }
            }
            Value::Object(out)
        }
        (Value::Array(p), Value::Array(r)) => {
            let mut out: Vec<Value> = Vec::with_capacity(p.len() + r.len());
            let mut placed = vec![false; r.len()];
            for item in p {
                // A refined item that completes a partial prior row takes its place
                match r.iter().position(|candidate| covers(candidate, item)) {
                    Some(i) if !placed[i] => {
                        placed[i] = true;
                        out.push(r[i].clone());
                    }
                    Some(_) => {}
                    None if !out.contains(item) => out.push(item.clone()),
                    None => {}
                }
            }
            for (item, placed) in r.iter().zip(placed) {
                if !placed && !out.contains(item) {
                    out.push(item.clone());
                }
            }
            Value::Array(out)
        }
        (Value::Object(_) | Value::Array(_), _) => prior.clone(),
        _ => refined.clone(),
    }
}

/// Whether `refined` carries every non-null value of `prior`.
fn covers(refined: &Value, prior: &Value) -> bool {
    match (refined, prior) {
        (_, Value::Null) => true,
        (Value::Object(r), Value::Object(p)) => p
            .iter()
            .filter(|(_, v)| !v.is_null())
            .all(|(k, v)| r.get(k).is_some_and(|rv| covers(rv, v))),
        (Value::Array(r), Value::Array(p)) => p.iter().all(|v| r.iter().any(|rv| covers(rv, v))),
        _ => refined == prior,
    }
}

/// Split `dom` into pieces of at most `max_chars` characters, preferring to
/// break after a newline or a closing `>` in the back half of a piece.
pub fn chunk_dom(dom: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if dom.is_empty() {
        return vec![String::new()];
    }

    let mut chunks = Vec::new();
    let mut rest = dom;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == rest.len() {
            chunks.push(rest.to_string());
            break;
        }

        let window = &rest[..end];
        let boundary = |c: char| {
            window
                .rfind(c)
                .map(|i| i + 1)
                .filter(|&i| i > end / 2)
        };
        let cut = boundary('\n').or_else(|| boundary('>')).unwrap_or(end);
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    chunks
}
