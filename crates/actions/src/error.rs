//! Action-level error type.

use thiserror::Error;

use crate::driver::DriverError;
use crate::storage::StorageError;

/// Errors returned by an action's `execute` method (and by dispatch).
///
/// None of these are retried inside the action; the orchestrator decides
/// what a failure means for the rest of the run.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action's configuration is missing a required key, has a key of
    /// the wrong type, or failed a semantic check. Raised before any side
    /// effect takes place.
    #[error("invalid config for '{action_type}' action: {reason}")]
    InvalidConfig {
        action_type: String,
        reason: String,
    },

    /// No factory is registered for the requested type string.
    #[error("no action registered for type '{0}'")]
    UnknownActionType(String),

    /// The browser driver reported a failure.
    #[error("browser driver error: {0}")]
    Driver(#[from] DriverError),

    /// Uploading an artifact failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The run was cancelled before this action (or iteration) started.
    #[error("execution cancelled")]
    Cancelled,

    /// A bounded loop hit its force-stop limit with `fail_on_force_stop` set.
    #[error("loop force-stopped after {iterations} iteration(s): {reason}")]
    ForceStopped { iterations: u64, reason: String },

    /// Generic failure raised by an action implementation.
    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    /// Shorthand for building an [`ActionError::InvalidConfig`].
    pub fn invalid_config(action_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            action_type: action_type.into(),
            reason: reason.into(),
        }
    }

    /// `true` when the error stems from cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
