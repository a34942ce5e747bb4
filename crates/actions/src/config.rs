//! Per-automation configuration.
//!
//! Parsed once per automation run from the automation's raw JSON config and
//! shared read-only (behind an `Arc`) by every loop index of that run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ActionError;

/// Top-level automation configuration. Every field has a default so a
/// missing or empty config is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub variables: Vec<Variable>,
    pub multirun: MultiRunConfig,
    /// Overall timeout in seconds. Reserved: enforcement belongs to the driver.
    #[serde(alias = "timeout_s")]
    pub timeout: u64,
    /// Reserved for runner-level retry policy; actions never retry.
    pub retries: u32,
    pub screenshots: ScreenshotConfig,
    pub notifications: Vec<NotificationChannelConfig>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            multirun: MultiRunConfig::default(),
            timeout: 300,
            retries: 0,
            screenshots: ScreenshotConfig::default(),
            notifications: Vec::new(),
        }
    }
}

impl AutomationConfig {
    /// Parse the raw JSON config stored on an automation.
    ///
    /// `None`, empty and whitespace-only input yield the defaults.
    ///
    /// # Errors
    /// Returns [`ActionError::InvalidConfig`] when the JSON is malformed.
    pub fn parse(raw: Option<&str>) -> Result<Self, ActionError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(json) => serde_json::from_str(json).map_err(|e| {
                ActionError::invalid_config("automation", format!("malformed config JSON: {e}"))
            }),
        }
    }

    /// Number of loop indices this run executes.
    pub fn run_count(&self) -> usize {
        if self.multirun.enabled {
            self.multirun.count.max(1)
        } else {
            1
        }
    }

    /// Execution mode for the loop indices. A single run is always sequential.
    pub fn run_mode(&self) -> RunMode {
        if self.run_count() > 1 {
            self.multirun.mode
        } else {
            RunMode::Sequential
        }
    }

    /// Look up a declared variable by key.
    pub fn variable(&self, key: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.key == key)
    }
}

/// Repeated execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiRunConfig {
    pub enabled: bool,
    pub mode: RunMode,
    pub count: usize,
    /// Pause between consecutive sequential runs, in milliseconds.
    #[serde(alias = "delay_ms")]
    pub delay: u64,
}

impl Default for MultiRunConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: RunMode::Sequential,
            count: 1,
            delay: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub enabled: bool,
    pub on_error: bool,
    pub on_success: bool,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_error: true,
            on_success: false,
        }
    }
}

/// A variable declared on the automation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    #[serde(rename = "type", default)]
    pub kind: VariableKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Literal value.
    #[default]
    Static,
    /// Value is a `{{faker.<method>}}` expression, regenerated on every use.
    Dynamic,
    /// Value is itself a template, re-resolved on every use.
    Environment,
}

/// Notification channel settings, consumed by the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannelConfig {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    #[serde(default)]
    pub on_complete: bool,
    #[serde(default = "default_true")]
    pub on_error: bool,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Slack,
    Email,
    Webhook,
}

fn default_true() -> bool {
    true
}
