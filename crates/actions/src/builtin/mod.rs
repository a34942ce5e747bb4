//! Built-in actions.
//!
//! Browser actions delegate to the run's [`BrowserDriver`](crate::driver::BrowserDriver);
//! flow actions touch only the run context. Each action deserializes its
//! config into a typed struct before doing anything else.

mod browser;
mod flow;
mod screenshot;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::control::{IfElseAction, LoopUntilAction};
use crate::registry::ActionRegistry;
use crate::ActionError;

pub use browser::{
    ClickAction, ExtractTextAction, FillAction, NavigateAction, SelectOptionAction,
    WaitForSelectorAction,
};
pub use flow::{LogAction, SetVariableAction, WaitAction};
pub use screenshot::{capture_screenshot, ScreenshotAction};

/// Register every built-in action on `registry`.
pub fn register_builtins(registry: &mut ActionRegistry) {
    registry
        .register("navigate", || Box::new(NavigateAction))
        .register("click", || Box::new(ClickAction))
        .register("fill", || Box::new(FillAction))
        .register("select_option", || Box::new(SelectOptionAction))
        .register("wait", || Box::new(WaitAction))
        .register("wait_for_selector", || Box::new(WaitForSelectorAction))
        .register("extract_text", || Box::new(ExtractTextAction))
        .register("set_variable", || Box::new(SetVariableAction))
        .register("screenshot", || Box::new(ScreenshotAction))
        .register("log", || Box::new(LogAction))
        .register("if_else", || Box::new(IfElseAction))
        .register("loop_until", || Box::new(LoopUntilAction));
}

/// Deserialize an action config into its typed form. Null counts as `{}`.
///
/// # Errors
/// [`ActionError::InvalidConfig`] carrying serde's description, which names
/// the missing or mistyped field.
pub(crate) fn parse_config<T: DeserializeOwned>(
    action_type: &str,
    config: &Value,
) -> Result<T, ActionError> {
    let config = match config {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(config).map_err(|e| ActionError::invalid_config(action_type, e.to_string()))
}

/// Reject an empty required string field.
pub(crate) fn require_non_empty(
    action_type: &str,
    field: &str,
    value: &str,
) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        return Err(ActionError::invalid_config(
            action_type,
            format!("`{field}` must not be empty"),
        ));
    }
    Ok(())
}

/// Log config keys the action does not understand.
pub(crate) fn note_unknown_keys(action_type: &str, extra: &Map<String, Value>) {
    if !extra.is_empty() {
        debug!(
            action_type,
            keys = ?extra.keys().collect::<Vec<_>>(),
            "ignoring unknown config keys"
        );
    }
}
