//! Error types for the Stepwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Stepwright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Cache errors ---
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    // --- Inference errors ---
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    // --- Page errors ---
    #[error("Page error: {0}")]
    Page(#[from] PageError),

    // --- Step errors ---
    #[error("Step error: {0}")]
    Step(#[from] StepError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport and backend failures from an LLM client.
///
/// These always propagate to the caller unmodified; the engines never retry
/// them.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("DOM snapshot failed: {0}")]
    SnapshotFailed(String),

    #[error("Screenshot capture failed: {0}")]
    ScreenshotFailed(String),

    #[error("Action failed: {method} on {target} — {reason}")]
    ActionFailed {
        method: String,
        target: String,
        reason: String,
    },

    #[error("Operation not supported by page driver: {0}")]
    NotSupported(String),
}

/// Failures of a single inference operation.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The model's output did not match the expected shape.
    #[error("Failed to parse {operation} response: {reason}")]
    Parse { operation: String, reason: String },

    #[error(transparent)]
    Page(#[from] PageError),
}

impl InferenceError {
    pub fn parse(operation: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("No handler registered for step type: {0}")]
    UnknownStepType(String),

    #[error("Invalid parameters for {step_type}: {reason}")]
    InvalidParams { step_type: String, reason: String },

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Step output could not be serialized: {0}")]
    Output(String),
}
