use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::run_action_list;
use crate::builtin::{note_unknown_keys, parse_config, require_non_empty};
use crate::definition::ActionDefinition;
use crate::driver::ElementCondition;
use crate::traits::{Action, ActionOutput, ExecutionFrame, RunContext};
use crate::variables::resolve_in_string;
use crate::ActionError;

#[derive(Debug, Deserialize)]
struct ElseIfBranch {
    selector: String,
    condition_type: ElementCondition,
    #[serde(default)]
    actions: Vec<ActionDefinition>,
}

#[derive(Debug, Deserialize)]
struct IfElseConfig {
    selector: String,
    condition_type: ElementCondition,
    #[serde(default)]
    if_actions: Vec<ActionDefinition>,
    #[serde(default)]
    else_if_conditions: Vec<ElseIfBranch>,
    #[serde(default)]
    else_actions: Vec<ActionDefinition>,
    #[serde(default)]
    final_actions: Vec<ActionDefinition>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl IfElseConfig {
    fn parse(config: &Value) -> Result<Self, ActionError> {
        let parsed: Self = parse_config("if_else", config)?;
        note_unknown_keys("if_else", &parsed.extra);
        require_non_empty("if_else", "selector", &parsed.selector)?;
        for (i, branch) in parsed.else_if_conditions.iter().enumerate() {
            require_non_empty(
                "if_else",
                &format!("else_if_conditions[{i}].selector"),
                &branch.selector,
            )?;
        }
        Ok(parsed)
    }
}

/// Which branch ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Taken {
    If,
    ElseIf(usize),
    Else,
}

impl Taken {
    fn label(self) -> String {
        match self {
            Self::If => "if".to_owned(),
            Self::ElseIf(i) => format!("else_if[{i}]"),
            Self::Else => "else".to_owned(),
        }
    }
}

/// `if_else`: run the first branch whose condition holds, then
/// `final_actions` regardless of the outcome.
///
/// Conditions are checked in order (primary, each else-if, else). A branch
/// failure still lets `final_actions` run, and is the error reported when
/// both fail.
pub struct IfElseAction;

impl IfElseAction {
    async fn run_branch(
        config: &IfElseConfig,
        frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<Taken, ActionError> {
        if ctx
            .driver
            .check(&config.selector, config.condition_type)
            .await?
        {
            run_action_list(frame, "if_actions", &config.if_actions, ctx).await?;
            return Ok(Taken::If);
        }

        for (i, branch) in config.else_if_conditions.iter().enumerate() {
            // Else-if entries sit under a nested key, so dispatch left them unresolved.
            let selector = resolve_in_string(&branch.selector, &ctx.variables, &ctx.config)
                .map_err(|e| ActionError::invalid_config("if_else", e.to_string()))?;
            if ctx.driver.check(&selector, branch.condition_type).await? {
                let list_key = format!("else_if_conditions[{i}].actions");
                run_action_list(frame, &list_key, &branch.actions, ctx).await?;
                return Ok(Taken::ElseIf(i));
            }
        }

        run_action_list(frame, "else_actions", &config.else_actions, ctx).await?;
        Ok(Taken::Else)
    }
}

#[async_trait]
impl Action for IfElseAction {
    fn action_type(&self) -> &'static str {
        "if_else"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        IfElseConfig::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = IfElseConfig::parse(&config)?;

        let branch = Self::run_branch(&config, frame, ctx).await;
        let finally = run_action_list(frame, "final_actions", &config.final_actions, ctx).await;

        let taken = branch?;
        finally?;
        debug!(action_id = %frame.action_id, branch = %taken.label(), "if_else finished");
        Ok(
            ActionOutput::message(format!("took {} branch", taken.label()))
                .with_data(json!({ "branch": taken.label() })),
        )
    }
}
