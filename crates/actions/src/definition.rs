//! Nested action definitions carried inside control-flow configs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const IF_ELSE_KEYS: &[&str] = &["if_actions", "else_if_conditions", "else_actions", "final_actions"];
const LOOP_UNTIL_KEYS: &[&str] = &["loop_actions"];

/// Config keys of `action_type` whose values are nested action lists.
/// Dispatch leaves them unresolved; each nested action resolves its own
/// config when it runs. Only control-flow actions carry nested lists.
pub fn nested_action_keys(action_type: &str) -> &'static [&'static str] {
    match action_type {
        "if_else" => IF_ELSE_KEYS,
        "loop_until" => LOOP_UNTIL_KEYS,
        _ => &[],
    }
}

/// One entry of a nested action list such as `if_actions` or `loop_actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "type")]
    pub action_type: String,
    #[serde(default, alias = "config")]
    pub action_config: Value,
}

impl ActionDefinition {
    /// Stable id: the declared id, or `<parent_id>.<list_key>[<index>]`.
    pub fn resolved_id(&self, parent_id: &str, list_key: &str, index: usize) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => format!("{parent_id}.{list_key}[{index}]"),
        }
    }

    /// Display name, falling back to the action type.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.action_type)
    }
}

/// Every nested action list inside an `action_type` config, paired with the list
/// key used for generated ids (`else_if_conditions[<i>].actions` for
/// else-if branches). Keys that are absent or null are skipped.
///
/// # Errors
/// The serde error of the first list that is not a list of definitions.
pub fn nested_action_lists(
    action_type: &str,
    config: &Value,
) -> Result<Vec<(String, Vec<ActionDefinition>)>, serde_json::Error> {
    let mut lists = Vec::new();
    let Some(map) = config.as_object() else {
        return Ok(lists);
    };

    for key in nested_action_keys(action_type) {
        let Some(value) = map.get(*key).filter(|v| !v.is_null()) else {
            continue;
        };
        if *key == "else_if_conditions" {
            let branches: Vec<Value> = serde_json::from_value(value.clone())?;
            for (i, branch) in branches.iter().enumerate() {
                if let Some(actions) = branch.get("actions").filter(|v| !v.is_null()) {
                    lists.push((
                        format!("else_if_conditions[{i}].actions"),
                        serde_json::from_value(actions.clone())?,
                    ));
                }
            }
        } else {
            lists.push(((*key).to_owned(), serde_json::from_value(value.clone())?));
        }
    }
    Ok(lists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_short_aliases() {
        let list: Vec<ActionDefinition> = serde_json::from_value(json!([
            {"type": "click", "config": {"selector": "#go"}},
            {"id": "custom", "name": "Fill", "action_type": "fill", "action_config": {}}
        ]))
        .unwrap();

        assert_eq!(list[0].action_type, "click");
        assert_eq!(list[0].action_config, json!({"selector": "#go"}));
        assert_eq!(list[0].resolved_id("a1", "if_actions", 0), "a1.if_actions[0]");
        assert_eq!(list[0].display_name(), "click");
        assert_eq!(list[1].resolved_id("a1", "if_actions", 1), "custom");
        assert_eq!(list[1].display_name(), "Fill");
    }

    #[test]
    fn nested_lists_include_else_if_branches() {
        let config = json!({
            "selector": "#a",
            "if_actions": [{"type": "click", "config": {"selector": "#b"}}],
            "else_if_conditions": [
                {"selector": "#c", "condition_type": "is_visible", "actions": [{"type": "log"}]}
            ],
            "final_actions": null
        });
        let lists = nested_action_lists("if_else", &config).unwrap();
        let keys: Vec<&str> = lists.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["if_actions", "else_if_conditions[0].actions"]);
        assert_eq!(lists[1].1[0].action_type, "log");

        assert!(nested_action_lists("loop_until", &json!({"loop_actions": 5})).is_err());
        assert!(nested_action_lists("if_else", &json!("not an object")).unwrap().is_empty());
    }

    #[test]
    fn only_control_flow_types_carry_nested_lists() {
        let config = json!({
            "actions": ["click", "fill"],
            "loop_actions": "plain data",
            "if_actions": [{"type": "log"}]
        });
        assert!(nested_action_lists("log", &config).unwrap().is_empty());
        assert!(nested_action_lists("record", &config).unwrap().is_empty());

        let lists = nested_action_lists("if_else", &json!({"actions": ["click"], "if_actions": [{"type": "log"}]}))
            .unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].0, "if_actions");

        assert_eq!(nested_action_keys("loop_until"), ["loop_actions"]);
        assert!(!nested_action_keys("if_else").contains(&"actions"));
    }

    #[test]
    fn type_is_required() {
        let r: Result<ActionDefinition, _> = serde_json::from_value(json!({"config": {}}));
        assert!(r.is_err());
    }
}
