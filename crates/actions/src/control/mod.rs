//! Control-flow actions: `if_else` and `loop_until`.
//!
//! Both run nested action lists through the same
//! [`dispatch_action`](crate::dispatch::dispatch_action) used for top-level
//! actions. Each nested call gets a child frame whose parent is the
//! control-flow action; nothing about the caller's frame is mutated.

mod if_else;
mod loop_until;

pub use if_else::IfElseAction;
pub use loop_until::{LoopUntilAction, LOOP_ITERATION_PAUSE};

use crate::definition::ActionDefinition;
use crate::dispatch::dispatch_action;
use crate::traits::{ExecutionFrame, RunContext};
use crate::ActionError;

/// Dispatch `actions` in order, stopping at the first error. Cancellation
/// is checked before each one.
pub(crate) async fn run_action_list(
    parent: &ExecutionFrame,
    list_key: &str,
    actions: &[ActionDefinition],
    ctx: &mut RunContext,
) -> Result<(), ActionError> {
    for (index, definition) in actions.iter().enumerate() {
        ctx.ensure_not_cancelled()?;
        let frame = parent.child(
            definition.resolved_id(&parent.action_id, list_key, index),
            definition.display_name(),
            definition.action_type.as_str(),
        );
        dispatch_action(&frame, &definition.action_config, ctx).await?;
    }
    Ok(())
}
