//! # Stepwright Core
//!
//! Domain types, traits, and error definitions for the Stepwright
//! inference-and-cache engine. This crate has **no framework dependencies**:
//! it defines the contracts every other crate implements against.
//!
//! ## Collaborators
//!
//! The engine talks to the outside world through three narrow traits:
//! - [`LlmClient`] — chat completions with tools, and structured-object calls
//! - [`CacheStore`] — a durable key→value store partitioned by [`CacheKind`]
//! - [`PageDriver`] — DOM snapshots, screenshots, and action dispatch
//!
//! Everything else (engines, cache, executor) lives in its own crate and
//! depends inward on this one.

pub mod cache;
pub mod error;
pub mod event;
pub mod message;
pub mod outcome;
pub mod page;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use cache::{CacheEntry, CacheEntryMeta, CacheKind, CacheStore};
pub use error::{CacheError, Error, InferenceError, PageError, ProviderError, Result, StepError};
pub use event::{EventBus, InferenceEvent};
pub use message::{Message, MessageToolCall, Role};
pub use outcome::{
    Action, Assertion, ElementDescriptor, ExtractionMetadata, ExtractionResult, Observation,
    Outcome, TestObjective, VisualCheckResult,
};
pub use page::PageDriver;
pub use provider::{
    ChatCompletionRequest, ChatCompletionResponse, ImageAttachment, LlmClient, ModelCapabilities,
    StructuredObjectRequest, ToolChoice, ToolDefinition, ToolProtocol, Usage,
};
