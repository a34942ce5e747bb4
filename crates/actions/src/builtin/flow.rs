//! Actions that only touch the run context: `wait`, `set_variable`, `log`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{note_unknown_keys, parse_config, require_non_empty};
use crate::traits::{Action, ActionOutput, ExecutionFrame, RunContext};
use crate::ActionError;

// ---------------------------------------------------------------------------
// wait
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WaitConfig {
    duration_ms: u64,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// `wait { duration_ms }`
pub struct WaitAction;

impl WaitAction {
    fn parse(config: &Value) -> Result<WaitConfig, ActionError> {
        let parsed: WaitConfig = parse_config("wait", config)?;
        note_unknown_keys("wait", &parsed.extra);
        Ok(parsed)
    }
}

#[async_trait]
impl Action for WaitAction {
    fn action_type(&self) -> &'static str {
        "wait"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        Self::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        _frame: &ExecutionFrame,
        _ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = Self::parse(&config)?;
        tokio::time::sleep(Duration::from_millis(config.duration_ms)).await;
        Ok(ActionOutput::message(format!("waited {} ms", config.duration_ms)))
    }
}

// ---------------------------------------------------------------------------
// set_variable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum VariableScope {
    #[default]
    Runtime,
    Global,
}

#[derive(Debug, Deserialize)]
struct SetVariableConfig {
    name: String,
    value: Value,
    #[serde(default)]
    scope: VariableScope,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// `set_variable { name, value, scope = "runtime" }`
///
/// The value is stored as JSON, so `{{runtime.<name>...}}` paths can reach
/// into objects and arrays set this way.
pub struct SetVariableAction;

impl SetVariableAction {
    fn parse(config: &Value) -> Result<SetVariableConfig, ActionError> {
        let parsed: SetVariableConfig = parse_config("set_variable", config)?;
        note_unknown_keys("set_variable", &parsed.extra);
        require_non_empty("set_variable", "name", &parsed.name)?;
        Ok(parsed)
    }
}

#[async_trait]
impl Action for SetVariableAction {
    fn action_type(&self) -> &'static str {
        "set_variable"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        Self::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        _frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = Self::parse(&config)?;
        let data = json!({ "name": config.name, "value": config.value });
        let message = match config.scope {
            VariableScope::Runtime => {
                ctx.variables.set_runtime(config.name.clone(), config.value);
                format!("set runtime variable '{}'", config.name)
            }
            VariableScope::Global => {
                ctx.variables.set_global(config.name.clone(), config.value);
                format!("set global variable '{}'", config.name)
            }
        };
        Ok(ActionOutput::message(message).with_data(data))
    }
}

// ---------------------------------------------------------------------------
// log
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LogConfig {
    message: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// `log { message }`: the resolved message becomes the action's log entry.
pub struct LogAction;

#[async_trait]
impl Action for LogAction {
    fn action_type(&self) -> &'static str {
        "log"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        parse_config::<LogConfig>("log", config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        frame: &ExecutionFrame,
        _ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config: LogConfig = parse_config("log", &config)?;
        note_unknown_keys("log", &config.extra);
        info!(
            loop_index = frame.loop_index,
            step = %frame.step_name,
            "{}",
            config.message
        );
        Ok(ActionOutput::message(config.message))
    }
}
