//! Browser-driver boundary.
//!
//! The engine never talks to a browser directly; every DOM interaction goes
//! through a [`BrowserDriver`] session owned by exactly one loop index.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a driver implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timed out after {timeout:?} waiting for '{selector}'")]
    Timeout { selector: String, timeout: Duration },

    #[error("navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("session unavailable: {0}")]
    Session(String),

    #[error("{0}")]
    Other(String),
}

/// Element state checks shared by `if_else` and `loop_until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCondition {
    IsEnabled,
    IsDisabled,
    IsVisible,
    IsHidden,
    IsChecked,
    IsEditable,
}

impl fmt::Display for ElementCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IsEnabled => "is_enabled",
            Self::IsDisabled => "is_disabled",
            Self::IsVisible => "is_visible",
            Self::IsHidden => "is_hidden",
            Self::IsChecked => "is_checked",
            Self::IsEditable => "is_editable",
        };
        f.write_str(s)
    }
}

/// One exclusive browser session.
///
/// Calls are bounded by the driver's own timeouts; the engine cannot
/// preempt an in-flight call.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    async fn text_content(&mut self, selector: &str) -> Result<String, DriverError>;

    /// Evaluate an element state check.
    async fn check(
        &mut self,
        selector: &str,
        condition: ElementCondition,
    ) -> Result<bool, DriverError>;

    /// Capture a PNG screenshot of the current page.
    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, DriverError>;

    /// Release the session. Called exactly once when the owning loop index ends.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Hands out one browser session per loop index.
#[async_trait]
pub trait DriverProvider: Send + Sync {
    async fn acquire(&self, loop_index: usize) -> Result<Box<dyn BrowserDriver>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_types_use_snake_case_names() {
        let c: ElementCondition = serde_json::from_value(serde_json::json!("is_checked")).unwrap();
        assert_eq!(c, ElementCondition::IsChecked);
        assert_eq!(ElementCondition::IsEditable.to_string(), "is_editable");
    }

    #[test]
    fn unknown_condition_type_is_rejected() {
        let r: Result<ElementCondition, _> = serde_json::from_value(serde_json::json!("is_purple"));
        assert!(r.is_err());
    }
}
