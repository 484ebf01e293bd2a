//! The per-call input shared by the tool-calling engines.

use stepwright_security::{Variables, is_valid_variable_name};

/// Which inference operation a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Act,
    Assert,
    Observe,
    Extract,
    Discover,
    VisualCheck,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Act => "act",
            Operation::Assert => "assert",
            Operation::Observe => "observe",
            Operation::Extract => "extract",
            Operation::Discover => "discover",
            Operation::VisualCheck => "visual_check",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical inference call.
///
/// Created per call and dropped once the outcome is returned. The
/// `request_id` stays fixed across every retry and cache lookup the call
/// makes.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub operation: Operation,
    pub instruction: String,
    pub dom_snapshot: String,
    pub screenshot: Option<Vec<u8>>,

    /// Narrative of steps already taken, oldest first
    pub prior_steps: Vec<String>,

    /// Variable values; only their names ever reach the model
    pub variables: Variables,

    pub request_id: String,
}

impl InferenceRequest {
    pub fn new(
        operation: Operation,
        instruction: impl Into<String>,
        dom_snapshot: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            instruction: instruction.into(),
            dom_snapshot: dom_snapshot.into(),
            screenshot: None,
            prior_steps: Vec::new(),
            variables: Variables::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_prior_steps(mut self, steps: Vec<String>) -> Self {
        self.prior_steps = steps;
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_screenshot(mut self, screenshot: Option<Vec<u8>>) -> Self {
        self.screenshot = screenshot;
        self
    }

    /// Valid variable names, sorted, as the model should write them.
    pub fn variable_placeholders(&self) -> Vec<String> {
        let mut names: Vec<&String> = self
            .variables
            .keys()
            .filter(|name| is_valid_variable_name(name))
            .collect();
        names.sort();
        names.into_iter().map(|n| format!("{{{{{n}}}}}")).collect()
    }
}
