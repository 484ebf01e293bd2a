//! Plan input and step output.

use serde::{Deserialize, Serialize};

/// One step of a plan: `{type, params, optional?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableStep {
    /// Handler key, e.g. "act", "assert", "extract"
    #[serde(rename = "type")]
    pub step_type: String,

    #[serde(default)]
    pub params: serde_json::Value,

    /// A failing optional step does not halt the plan
    #[serde(default)]
    pub optional: bool,
}

impl ExecutableStep {
    pub fn new(step_type: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            step_type: step_type.into(),
            params,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// What one step produced: `{success, output}` or `{success, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn ok(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Parse a JSON plan: an array of steps.
pub fn parse_plan(json: &str) -> Result<Vec<ExecutableStep>, serde_json::Error> {
    serde_json::from_str(json)
}
