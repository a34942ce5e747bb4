//! Engine-level error types.

use actions::{ActionError, DriverError};
use thiserror::Error;

/// Errors produced by the automation engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// The automation's config JSON is malformed.
    #[error("invalid automation config: {0}")]
    InvalidConfig(String),

    /// Two steps share the same `step_order`.
    #[error("duplicate step_order {order} (steps '{first}' and '{second}')")]
    DuplicateStepOrder {
        order: i32,
        first: String,
        second: String,
    },

    /// Two actions of one step share the same `action_order`.
    #[error("duplicate action_order {order} in step '{step}' (actions '{first}' and '{second}')")]
    DuplicateActionOrder {
        step: String,
        order: i32,
        first: String,
        second: String,
    },

    /// An action (possibly nested) failed validation.
    #[error("action '{action}' in step '{step}' is invalid: {source}")]
    InvalidAction {
        step: String,
        action: String,
        #[source]
        source: ActionError,
    },

    // ------ Execution errors ------

    /// An action failed; the loop index it ran in was aborted.
    #[error("loop {loop_index}: action '{action}' in step '{step}' failed: {source}")]
    ActionFailed {
        loop_index: usize,
        step: String,
        action: String,
        #[source]
        source: ActionError,
    },

    /// No browser session could be acquired for a loop index.
    #[error("loop {loop_index}: browser session unavailable: {source}")]
    Driver {
        loop_index: usize,
        #[source]
        source: DriverError,
    },

    /// The run was cancelled before it finished.
    #[error("automation run cancelled")]
    Cancelled,

    /// A loop-index task was torn down by the runtime.
    #[error("loop task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}

impl EngineError {
    /// `true` when the error stems from cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::ActionFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
