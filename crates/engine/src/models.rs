//! Core domain models for the automation engine.
//!
//! An [`Automation`] is the definition tree handed to the runner; an
//! [`AutomationRun`] is the record the runner fills in while executing it.
//! Both round-trip through JSON so definitions can come straight from a
//! file or an upstream service.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::aggregator::LogEntry;

// ---------------------------------------------------------------------------
// Automation definition
// ---------------------------------------------------------------------------

/// One action of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationAction {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Registry key of the implementation.
    #[serde(alias = "type")]
    pub action_type: String,
    pub action_order: i32,
    /// Raw, unresolved config. May contain nested action lists.
    #[serde(default, alias = "config")]
    pub action_config: Value,
}

/// An ordered group of actions with optional skip / run-only gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationStep {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub step_order: i32,
    /// The step is skipped when this condition holds.
    #[serde(default)]
    pub skip_condition: Option<String>,
    /// The step only runs when this condition holds.
    #[serde(default)]
    pub run_only_condition: Option<String>,
    /// Probability used by the `random` condition. Defaults to 0.5.
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub actions: Vec<AutomationAction>,
}

impl AutomationStep {
    /// Actions in ascending `action_order`.
    pub fn sorted_actions(&self) -> Vec<&AutomationAction> {
        let mut actions: Vec<_> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.action_order);
        actions
    }
}

/// A complete automation definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: Uuid,
    pub name: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub project_id: Uuid,
    /// Raw JSON of the automation config; parsed once per run.
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub steps: Vec<AutomationStep>,
}

impl Automation {
    /// Convenience constructor for testing.
    pub fn new(name: impl Into<String>, config: Option<String>, steps: Vec<AutomationStep>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            user_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            config,
            steps,
        }
    }

    /// Steps in ascending `step_order`.
    pub fn sorted_steps(&self) -> Vec<&AutomationStep> {
        let mut steps: Vec<_> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.step_order);
        steps
    }
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// Lifecycle of an [`AutomationRun`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `true` once the run can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// AutomationRun
// ---------------------------------------------------------------------------

/// The record of one execution of an automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRun {
    pub id: Uuid,
    pub automation_id: Uuid,
    pub status: RunStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub output_files: Vec<String>,
    #[serde(default)]
    pub error_message: String,
}

impl AutomationRun {
    /// A fresh `pending` run for `automation_id`.
    pub fn new(automation_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            automation_id,
            status: RunStatus::Pending,
            start_time: None,
            end_time: None,
            logs: Vec::new(),
            output_files: Vec::new(),
            error_message: String::new(),
        }
    }

    /// Wall-clock duration, once both ends are known.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<RunStatus>().unwrap(), status);
        }
        assert!("paused".parse::<RunStatus>().is_err());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn steps_and_actions_sort_by_order() {
        let automation: Automation = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "name": "orders",
            "user_id": Uuid::nil(),
            "steps": [
                {"id": "s2", "step_order": 2, "actions": []},
                {"id": "s1", "step_order": 1, "actions": [
                    {"id": "b", "type": "click", "action_order": 5, "config": {"selector": "#b"}},
                    {"id": "a", "action_type": "navigate", "action_order": 1, "action_config": {"url": "x"}}
                ]}
            ]
        }))
        .unwrap();

        let steps: Vec<&str> = automation.sorted_steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(steps, ["s1", "s2"]);
        let actions: Vec<&str> = automation.steps[1]
            .sorted_actions()
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(actions, ["a", "b"]);
        assert_eq!(automation.project_id, Uuid::nil());
        assert_eq!(automation.config, None);
    }

    #[test]
    fn new_run_is_pending() {
        let run = AutomationRun::new(Uuid::new_v4());
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.duration_ms().is_none());
    }
}
