//! Security layer for Stepwright — keeping variable values away from the model.
//!
//! Provides:
//! - **Variables**: `{{NAME}}` / `${NAME}` placeholder substitution, applied
//!   only after the model has answered
//! - **Redaction**: scrubbing variable values back out of text that leaves
//!   the engine (step errors, logs)

pub mod variables;

pub use variables::{
    is_valid_variable_name, placeholder_names, redact_values, resolve_action, substitute_variables,
    Variables,
};
