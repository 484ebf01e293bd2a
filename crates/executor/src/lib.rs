//! Step executor — runs a plan of inference steps against one page.
//!
//! A plan is an ordered list of `{type, params, optional}` steps. Each step
//! is dispatched to the [`StepHandler`] registered for its type; handlers
//! call the inference engines and hand resolved actions and assertions to
//! the page driver. Steps run one at a time, in order.

pub mod context;
pub mod executor;
pub mod handler;
pub mod handlers;
pub mod plan;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::ExecutionContext;
pub use executor::StepExecutor;
pub use handler::{HandlerRegistry, StepHandler, parse_params, to_output};
pub use handlers::default_registry;
pub use plan::{ExecutableStep, StepResult, parse_plan};
