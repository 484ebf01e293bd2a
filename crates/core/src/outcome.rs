//! Typed results of inference operations.
//!
//! "The model decided nothing applies" is always a value here (`Skip`,
//! an empty list, `success = false`); "the call could not complete" is
//! always an `Err` somewhere else.

use serde::{Deserialize, Serialize};

/// A concrete browser action resolved from an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Interaction method, e.g. "click", "fill", "press", "scrollTo"
    pub method: String,

    /// Reference of the target element in the DOM snapshot
    pub target_element_ref: String,

    /// Method arguments (text to type, key to press, ...)
    #[serde(default)]
    pub args: Vec<String>,

    /// Whether this action completes the instruction
    #[serde(default)]
    pub completed: bool,

    /// One-line narrative of what the step does
    pub step_description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// Selector path of the target (xpath/css), when the model supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
}

impl Action {
    /// Return a copy with every argument passed through `f`.
    pub fn map_args(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            args: self.args.iter().map(|a| f(a)).collect(),
            ..self.clone()
        }
    }
}

/// A concrete validation resolved from an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Matcher, e.g. "toBeVisible", "toHaveText", "toContainText"
    pub method: String,

    pub target_element_ref: String,

    /// Expected value for value-bearing matchers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default)]
    pub completed: bool,

    pub step_description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
}

/// The result of `act` or `assert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Action(Action),
    Assertion(Assertion),
    /// Explicit no-op: the instruction does not apply to the current page.
    Skip,
}

impl Outcome {
    pub fn is_skip(&self) -> bool {
        matches!(self, Outcome::Skip)
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Outcome::Action(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_assertion(&self) -> Option<&Assertion> {
        match self {
            Outcome::Assertion(a) => Some(a),
            _ => None,
        }
    }
}

/// A UI element the model considers relevant to an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub element_ref: String,
    pub description: String,

    /// Suggested interaction, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// The result of `observe`: elements in rank order, or a skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "elements", rename_all = "snake_case")]
pub enum Observation {
    Elements(Vec<ElementDescriptor>),
    Skip,
}

impl Observation {
    pub fn elements(&self) -> &[ElementDescriptor] {
        match self {
            Observation::Elements(e) => e,
            Observation::Skip => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Functional,
    Navigation,
    Form,
    Accessibility,
    Visual,
    Security,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// A test objective proposed by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestObjective {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
    pub complexity: Complexity,
}

impl TestObjective {
    pub const TITLE_CHARS: std::ops::RangeInclusive<usize> = 3..=120;
    pub const DESCRIPTION_CHARS: std::ops::RangeInclusive<usize> = 10..=500;

    /// Check the string-length constraints the schema declares.
    pub fn validate(&self) -> Result<(), String> {
        let title_len = self.title.trim().chars().count();
        if !Self::TITLE_CHARS.contains(&title_len) {
            return Err(format!("title length {title_len} outside {:?}", Self::TITLE_CHARS));
        }
        let desc_len = self.description.trim().chars().count();
        if !Self::DESCRIPTION_CHARS.contains(&desc_len) {
            return Err(format!(
                "description length {desc_len} outside {:?}",
                Self::DESCRIPTION_CHARS
            ));
        }
        Ok(())
    }
}

/// Result of a visual yes/no check. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualCheckResult {
    pub success: bool,

    /// Human-readable verdict; never empty
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// The question that was asked
    pub prompt: String,
}

impl VisualCheckResult {
    pub fn from_verdict(prompt: &str, passed: bool, reasoning: String) -> Self {
        let message = if passed {
            format!("Visual check passed: {reasoning}")
        } else {
            format!("Visual check failed: {reasoning}")
        };
        Self {
            success: passed,
            message,
            reasoning: Some(reasoning),
            prompt: prompt.to_string(),
        }
    }

    pub fn failure(prompt: &str, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "Visual check could not be completed".into();
        }
        Self {
            success: false,
            message,
            reasoning: None,
            prompt: prompt.to_string(),
        }
    }
}

/// Progress signal attached to every extraction result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub progress: String,
    pub completed: bool,
}

/// Extracted fields plus `metadata`, serialized flat:
/// `{ ...fields, "metadata": { "progress", "completed" } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
    pub metadata: ExtractionMetadata,
}
