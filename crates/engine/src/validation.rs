//! Static checks on an automation definition, run before it is stored or
//! executed.
//!
//! Rules enforced:
//! 1. The automation config JSON parses.
//! 2. `step_order` is unique across steps; `action_order` is unique within a step.
//! 3. Every action type, nested ones included, is registered.
//! 4. Every action's own `validate` accepts its (unresolved) config.

use std::collections::HashMap;

use actions::config::AutomationConfig;
use actions::definition::nested_action_lists;
use actions::{ActionError, ActionRegistry};

use crate::models::Automation;
use crate::EngineError;

/// Validate `automation` against `registry`.
///
/// # Errors
/// - [`EngineError::InvalidConfig`] if the automation config does not parse.
/// - [`EngineError::DuplicateStepOrder`] / [`EngineError::DuplicateActionOrder`].
/// - [`EngineError::InvalidAction`] for an unknown type or a rejected config,
///   naming the offending (possibly nested) action id.
pub fn validate_automation(
    automation: &Automation,
    registry: &ActionRegistry,
) -> Result<(), EngineError> {
    AutomationConfig::parse(automation.config.as_deref())
        .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

    let mut step_orders: HashMap<i32, &str> = HashMap::new();
    for step in &automation.steps {
        if let Some(first) = step_orders.insert(step.step_order, &step.id) {
            return Err(EngineError::DuplicateStepOrder {
                order: step.step_order,
                first: first.to_owned(),
                second: step.id.clone(),
            });
        }

        let mut action_orders: HashMap<i32, &str> = HashMap::new();
        for action in &step.actions {
            if let Some(first) = action_orders.insert(action.action_order, &action.id) {
                return Err(EngineError::DuplicateActionOrder {
                    step: step.id.clone(),
                    order: action.action_order,
                    first: first.to_owned(),
                    second: action.id.clone(),
                });
            }

            validate_action(&action.id, &action.action_type, &action.action_config, registry)
                .map_err(|(action, source)| EngineError::InvalidAction {
                    step: step.id.clone(),
                    action,
                    source,
                })?;
        }
    }
    Ok(())
}

/// Validate one action and, recursively, every action nested in its config.
/// The error carries the id of the action that failed.
fn validate_action(
    id: &str,
    action_type: &str,
    config: &serde_json::Value,
    registry: &ActionRegistry,
) -> Result<(), (String, ActionError)> {
    let fail = |e| (id.to_owned(), e);

    let action = registry.get(action_type).map_err(fail)?;
    action.validate(config).map_err(fail)?;

    let lists = nested_action_lists(action_type, config)
        .map_err(|e| fail(ActionError::invalid_config(action_type, e.to_string())))?;
    for (list_key, definitions) in lists {
        for (index, definition) in definitions.iter().enumerate() {
            validate_action(
                &definition.resolved_id(id, &list_key, index),
                &definition.action_type,
                &definition.action_config,
                registry,
            )?;
        }
    }
    Ok(())
}
