//! PageDriver trait — the browser/DOM collaborator.
//!
//! The engine never drives a browser itself. It asks the driver for a DOM
//! snapshot or a screenshot, and hands resolved actions and assertions back
//! to it. Settle timeouts are passed through untouched.

use async_trait::async_trait;

use crate::error::PageError;
use crate::outcome::{Action, Assertion};

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// The current DOM as text the model can read.
    async fn dom_snapshot(&self) -> Result<String, PageError>;

    /// PNG bytes of the page.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, PageError>;

    /// Dispatch an action with variables already resolved.
    async fn perform(&self, action: &Action, settle_timeout_ms: Option<u64>)
    -> Result<(), PageError>;

    /// Evaluate an assertion against the live page.
    async fn verify(&self, assertion: &Assertion) -> Result<bool, PageError>;
}
