use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use super::run_action_list;
use crate::builtin::{note_unknown_keys, parse_config};
use crate::definition::ActionDefinition;
use crate::driver::ElementCondition;
use crate::traits::{Action, ActionOutput, ExecutionFrame, RunContext};
use crate::ActionError;

/// Pause between iterations.
pub const LOOP_ITERATION_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct LoopUntilConfig {
    #[serde(default)]
    max_loops: Option<u64>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    selector: Option<String>,
    #[serde(default)]
    condition_type: Option<ElementCondition>,
    #[serde(default)]
    fail_on_force_stop: bool,
    #[serde(default)]
    loop_actions: Vec<ActionDefinition>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl LoopUntilConfig {
    fn parse(config: &Value) -> Result<Self, ActionError> {
        let mut parsed: Self = parse_config("loop_until", config)?;
        note_unknown_keys("loop_until", &parsed.extra);

        if parsed.max_loops.is_none() && parsed.timeout_ms.is_none() {
            return Err(ActionError::invalid_config(
                "loop_until",
                "at least one of `max_loops` or `timeout_ms` is required",
            ));
        }
        for (field, value) in [("max_loops", parsed.max_loops), ("timeout_ms", parsed.timeout_ms)] {
            if value == Some(0) {
                return Err(ActionError::invalid_config(
                    "loop_until",
                    format!("`{field}` must be greater than 0"),
                ));
            }
        }

        parsed.selector = parsed.selector.take().filter(|s| !s.trim().is_empty());
        if parsed.selector.is_some() && parsed.condition_type.is_none() {
            return Err(ActionError::invalid_config(
                "loop_until",
                "`condition_type` is required when `selector` is set",
            ));
        }
        Ok(parsed)
    }

    /// The exit check, when both halves are configured.
    fn exit_condition(&self) -> Option<(&str, ElementCondition)> {
        self.selector.as_deref().zip(self.condition_type)
    }

    fn force_stop_reason(&self, completed: usize, elapsed: Duration) -> Option<String> {
        if let Some(max) = self.max_loops {
            if u64::try_from(completed).unwrap_or(u64::MAX) >= max {
                return Some(format!("reached max_loops ({max})"));
            }
        }
        if let Some(timeout) = self.timeout_ms {
            if elapsed >= Duration::from_millis(timeout) {
                return Some(format!("reached timeout_ms ({timeout})"));
            }
        }
        None
    }
}

#[derive(Debug)]
enum LoopExit {
    ConditionMet,
    Stopped(String),
}

/// `loop_until`: repeat `loop_actions` until an element condition holds or
/// a `max_loops` / `timeout_ms` bound is reached.
///
/// The iteration counter (from 0) is exposed as `{{localLoopIndex}}` while
/// the loop runs; the enclosing value is restored when it exits.
pub struct LoopUntilAction;

impl LoopUntilAction {
    async fn iterate(
        config: &LoopUntilConfig,
        frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<(usize, LoopExit), ActionError> {
        let started = Instant::now();
        let mut counter = 0usize;

        loop {
            ctx.ensure_not_cancelled()?;
            ctx.variables.local_loop_index = counter;

            if let Some((selector, condition)) = config.exit_condition() {
                if ctx.driver.check(selector, condition).await? {
                    return Ok((counter, LoopExit::ConditionMet));
                }
            }

            if let Some(reason) = config.force_stop_reason(counter, started.elapsed()) {
                if config.fail_on_force_stop {
                    return Err(ActionError::ForceStopped {
                        iterations: u64::try_from(counter).unwrap_or(u64::MAX),
                        reason,
                    });
                }
                return Ok((counter, LoopExit::Stopped(reason)));
            }

            run_action_list(frame, "loop_actions", &config.loop_actions, ctx).await?;
            debug!(action_id = %frame.action_id, iteration = counter, "loop iteration done");
            tokio::time::sleep(LOOP_ITERATION_PAUSE).await;
            counter += 1;
        }
    }
}

#[async_trait]
impl Action for LoopUntilAction {
    fn action_type(&self) -> &'static str {
        "loop_until"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        LoopUntilConfig::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = LoopUntilConfig::parse(&config)?;

        let enclosing = ctx.variables.local_loop_index;
        let result = Self::iterate(&config, frame, ctx).await;
        ctx.variables.local_loop_index = enclosing;

        let (iterations, exit) = result?;
        let message = match &exit {
            LoopExit::ConditionMet => {
                format!("loop exited after {iterations} iteration(s): condition met")
            }
            LoopExit::Stopped(reason) => {
                info!(action_id = %frame.action_id, iterations, %reason, "loop force-stopped");
                format!("loop stopped after {iterations} iteration(s): {reason}")
            }
        };
        Ok(ActionOutput::message(message).with_data(json!({
            "iterations": iterations,
            "condition_met": matches!(exit, LoopExit::ConditionMet),
        })))
    }
}
