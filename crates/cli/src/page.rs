//! A page driver over a saved DOM snapshot.
//!
//! Nothing is clicked or typed: actions are checked against the snapshot
//! and recorded, and assertions are answered from the snapshot text.

use std::sync::Mutex;

use async_trait::async_trait;
use stepwright_core::error::PageError;
use stepwright_core::outcome::{Action, Assertion};
use stepwright_core::page::PageDriver;
use tracing::info;

pub struct SnapshotPage {
    dom: String,
    screenshot: Option<Vec<u8>>,
    performed: Mutex<Vec<Action>>,
}

impl SnapshotPage {
    pub fn new(dom: String, screenshot: Option<Vec<u8>>) -> Self {
        Self {
            dom,
            screenshot,
            performed: Mutex::new(Vec::new()),
        }
    }

    pub fn performed_count(&self) -> usize {
        self.performed.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Whether an element with reference `target` appears in the snapshot.
    fn has_ref(&self, target: &str) -> bool {
        if target.is_empty() {
            return false;
        }
        self.dom.match_indices("ref=").any(|(i, _)| {
            let rest = self.dom[i + 4..].trim_start_matches(['"', '\'']);
            let token = rest
                .split(|c: char| matches!(c, '"' | '\'' | '>' | '/') || c.is_whitespace())
                .next()
                .unwrap_or_default();
            token == target
        })
    }
}

#[async_trait]
impl PageDriver for SnapshotPage {
    async fn dom_snapshot(&self) -> Result<String, PageError> {
        Ok(self.dom.clone())
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>, PageError> {
        self.screenshot
            .clone()
            .ok_or_else(|| PageError::ScreenshotFailed("no screenshot file was given".into()))
    }

    async fn perform(&self, action: &Action, settle_timeout_ms: Option<u64>) -> Result<(), PageError> {
        if action.method != "goto" && !self.has_ref(&action.target_element_ref) {
            return Err(PageError::ActionFailed {
                method: action.method.clone(),
                target: action.target_element_ref.clone(),
                reason: "element not present in snapshot".into(),
            });
        }

        // Arguments may hold resolved secrets, so only the shape is logged
        info!(
            method = %action.method,
            target = %action.target_element_ref,
            args = action.args.len(),
            settle_timeout_ms,
            "Recorded action"
        );
        if let Ok(mut performed) = self.performed.lock() {
            performed.push(action.clone());
        }
        Ok(())
    }

    async fn verify(&self, assertion: &Assertion) -> Result<bool, PageError> {
        let present = self.has_ref(&assertion.target_element_ref);
        Ok(match assertion.method.as_str() {
            "toBeHidden" => !present,
            _ => present && assertion.value.as_deref().is_none_or(|v| self.dom.contains(v)),
        })
    }
}
