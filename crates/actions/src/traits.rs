//! The `Action` trait and the context every action executes against.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::AutomationConfig;
use crate::driver::BrowserDriver;
use crate::events::{EventSender, RunEvent};
use crate::registry::ActionRegistry;
use crate::storage::StorageService;
use crate::variables::VariableContext;
use crate::ActionError;

/// Identity of the action currently executing.
///
/// Passed by reference into every dispatch; nested dispatch derives a new
/// frame with [`ExecutionFrame::child`] instead of mutating shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionFrame {
    pub loop_index: usize,
    pub step_id: String,
    pub step_name: String,
    /// Empty for a step-level frame.
    pub action_id: String,
    pub action_name: String,
    pub action_type: String,
    pub parent_action_id: Option<String>,
}

impl ExecutionFrame {
    /// Frame for a step, before any action runs.
    pub fn for_step(
        loop_index: usize,
        step_id: impl Into<String>,
        step_name: impl Into<String>,
    ) -> Self {
        Self {
            loop_index,
            step_id: step_id.into(),
            step_name: step_name.into(),
            ..Self::default()
        }
    }

    /// Frame for an action invoked from this frame. A step-level frame
    /// produces a top-level action (no parent); an action frame produces a
    /// nested action whose parent is the current action.
    #[must_use]
    pub fn child(
        &self,
        action_id: impl Into<String>,
        action_name: impl Into<String>,
        action_type: impl Into<String>,
    ) -> Self {
        let parent_action_id = if self.action_id.is_empty() {
            None
        } else {
            Some(self.action_id.clone())
        };
        Self {
            loop_index: self.loop_index,
            step_id: self.step_id.clone(),
            step_name: self.step_name.clone(),
            action_id: action_id.into(),
            action_name: action_name.into(),
            action_type: action_type.into(),
            parent_action_id,
        }
    }
}

/// What a successful action reports back for its terminal log event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutput {
    pub message: String,
    pub data: Option<Value>,
}

impl ActionOutput {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Everything an action may touch while executing within one loop index.
///
/// Owned by the loop index; never shared with another loop index.
pub struct RunContext {
    /// Exclusive browser session for this loop index.
    pub driver: Box<dyn BrowserDriver>,
    pub storage: Arc<dyn StorageService>,
    pub events: EventSender,
    pub variables: VariableContext,
    pub config: Arc<AutomationConfig>,
    pub registry: Arc<ActionRegistry>,
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Emit a log entry for the given frame at the current local loop index.
    pub fn emit_log(&self, frame: &ExecutionFrame, message: impl Into<String>) {
        self.events
            .emit(RunEvent::log(frame, self.variables.local_loop_index, message));
    }

    /// Emit an output-file entry for the given frame.
    pub fn emit_output_file(
        &self,
        frame: &ExecutionFrame,
        url: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.events.emit(RunEvent::output_file(
            frame,
            self.variables.local_loop_index,
            url,
            message,
        ));
    }

    /// Fail with [`ActionError::Cancelled`] when the run has been cancelled.
    pub fn ensure_not_cancelled(&self) -> Result<(), ActionError> {
        if self.cancel.is_cancelled() {
            return Err(ActionError::Cancelled);
        }
        Ok(())
    }
}

/// The core action trait.
///
/// Built-in actions and plugins alike implement this. A fresh instance is
/// produced by the registry for every invocation, so implementations must
/// not rely on state surviving between calls.
#[async_trait]
pub trait Action: Send + Sync {
    /// Stable type string used as the registry key.
    fn action_type(&self) -> &'static str;

    /// Check the (unresolved) config without performing any side effect.
    fn validate(&self, config: &Value) -> Result<(), ActionError>;

    /// Run the action with its resolved config.
    async fn execute(
        &self,
        config: Value,
        frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_action_has_no_parent() {
        let step = ExecutionFrame::for_step(1, "s1", "Step");
        let action = step.child("a1", "Open", "navigate");
        assert_eq!(action.parent_action_id, None);
        assert_eq!(action.loop_index, 1);
        assert_eq!(action.step_id, "s1");
    }

    #[test]
    fn nested_action_points_at_invoking_action() {
        let outer = ExecutionFrame::for_step(0, "s1", "Step").child("a1", "Branch", "if_else");
        let inner = outer.child("a1.if_actions[0]", "Click", "click");
        let innermost = inner.child("a1.if_actions[0].loop_actions[0]", "Fill", "fill");

        assert_eq!(inner.parent_action_id.as_deref(), Some("a1"));
        assert_eq!(innermost.parent_action_id.as_deref(), Some("a1.if_actions[0]"));
        assert_eq!(outer.action_id, "a1", "deriving a child leaves the parent untouched");
    }
}
