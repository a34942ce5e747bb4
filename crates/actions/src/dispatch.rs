//! The single dispatch routine shared by top-level and nested actions.

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::definition::nested_action_keys;
use crate::events::RunEvent;
use crate::traits::{ActionOutput, ExecutionFrame, RunContext};
use crate::variables::resolve_in_config_except;
use crate::ActionError;

/// Resolve, look up and execute one action, then emit its terminal event.
///
/// `frame` is the action's own frame (see [`ExecutionFrame::child`]). A
/// cancellation observed before the action starts returns
/// [`ActionError::Cancelled`] without emitting anything; every action that
/// does start emits exactly one `log` or `error` event.
pub async fn dispatch_action(
    frame: &ExecutionFrame,
    config: &Value,
    ctx: &mut RunContext,
) -> Result<ActionOutput, ActionError> {
    ctx.ensure_not_cancelled()?;

    let started = Instant::now();
    let result = resolve_and_execute(frame, config, ctx).await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let local = ctx.variables.local_loop_index;

    match &result {
        Ok(output) => {
            debug!(
                action_id = %frame.action_id,
                action_type = %frame.action_type,
                duration_ms,
                "action completed"
            );
            let message = if output.message.is_empty() {
                format!("{} completed", frame.action_type)
            } else {
                output.message.clone()
            };
            let mut event = RunEvent::log(frame, local, message).with_duration(duration_ms);
            if let Some(data) = &output.data {
                event = event.with_data(data.clone());
            }
            ctx.events.emit(event);
        }
        Err(e) => {
            warn!(
                action_id = %frame.action_id,
                action_type = %frame.action_type,
                loop_index = frame.loop_index,
                error = %e,
                "action failed"
            );
            ctx.events
                .emit(RunEvent::error(frame, local, e.to_string()).with_duration(duration_ms));
        }
    }

    result
}

async fn resolve_and_execute(
    frame: &ExecutionFrame,
    config: &Value,
    ctx: &mut RunContext,
) -> Result<ActionOutput, ActionError> {
    let config = match config {
        Value::Null => Value::Object(serde_json::Map::new()),
        Value::Object(_) => config.clone(),
        other => {
            return Err(ActionError::invalid_config(
                &frame.action_type,
                format!("config must be a JSON object, got {other}"),
            ))
        }
    };

    let skip = nested_action_keys(&frame.action_type);
    let resolved = resolve_in_config_except(&config, &ctx.variables, &ctx.config, skip)
        .map_err(|e| ActionError::invalid_config(&frame.action_type, e.to_string()))?;

    let action = ctx.registry.get(&frame.action_type)?;
    action.execute(resolved, frame, ctx).await
}
