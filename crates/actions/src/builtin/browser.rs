//! Actions that drive the browser session directly.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{note_unknown_keys, parse_config, require_non_empty};
use crate::traits::{Action, ActionOutput, ExecutionFrame, RunContext};
use crate::ActionError;

const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

// ---------------------------------------------------------------------------
// navigate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NavigateConfig {
    url: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl NavigateConfig {
    fn parse(config: &Value) -> Result<Self, ActionError> {
        let parsed: Self = parse_config("navigate", config)?;
        note_unknown_keys("navigate", &parsed.extra);
        require_non_empty("navigate", "url", &parsed.url)?;
        Ok(parsed)
    }
}

/// `navigate { url }`
pub struct NavigateAction;

#[async_trait]
impl Action for NavigateAction {
    fn action_type(&self) -> &'static str {
        "navigate"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        NavigateConfig::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        _frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = NavigateConfig::parse(&config)?;
        ctx.driver.navigate(&config.url).await?;
        Ok(ActionOutput::message(format!("navigated to {}", config.url)))
    }
}

// ---------------------------------------------------------------------------
// click
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ClickConfig {
    selector: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ClickConfig {
    fn parse(config: &Value) -> Result<Self, ActionError> {
        let parsed: Self = parse_config("click", config)?;
        note_unknown_keys("click", &parsed.extra);
        require_non_empty("click", "selector", &parsed.selector)?;
        Ok(parsed)
    }
}

/// `click { selector }`
pub struct ClickAction;

#[async_trait]
impl Action for ClickAction {
    fn action_type(&self) -> &'static str {
        "click"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        ClickConfig::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        _frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = ClickConfig::parse(&config)?;
        ctx.driver.click(&config.selector).await?;
        Ok(ActionOutput::message(format!("clicked {}", config.selector)))
    }
}

// ---------------------------------------------------------------------------
// fill / select_option
// ---------------------------------------------------------------------------

/// Shared shape of `fill` and `select_option`.
#[derive(Debug, Deserialize)]
struct InputConfig {
    selector: String,
    value: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl InputConfig {
    fn parse(action_type: &str, config: &Value) -> Result<Self, ActionError> {
        let parsed: Self = parse_config(action_type, config)?;
        note_unknown_keys(action_type, &parsed.extra);
        require_non_empty(action_type, "selector", &parsed.selector)?;
        Ok(parsed)
    }
}

/// `fill { selector, value }`
pub struct FillAction;

#[async_trait]
impl Action for FillAction {
    fn action_type(&self) -> &'static str {
        "fill"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        InputConfig::parse("fill", config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        _frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = InputConfig::parse("fill", &config)?;
        ctx.driver.fill(&config.selector, &config.value).await?;
        Ok(ActionOutput::message(format!("filled {}", config.selector)))
    }
}

/// `select_option { selector, value }`
pub struct SelectOptionAction;

#[async_trait]
impl Action for SelectOptionAction {
    fn action_type(&self) -> &'static str {
        "select_option"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        InputConfig::parse("select_option", config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        _frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = InputConfig::parse("select_option", &config)?;
        ctx.driver
            .select_option(&config.selector, &config.value)
            .await?;
        Ok(ActionOutput::message(format!(
            "selected '{}' in {}",
            config.value, config.selector
        )))
    }
}

// ---------------------------------------------------------------------------
// wait_for_selector
// ---------------------------------------------------------------------------

fn default_wait_timeout() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

#[derive(Debug, Deserialize)]
struct WaitForSelectorConfig {
    selector: String,
    #[serde(default = "default_wait_timeout")]
    timeout_ms: u64,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl WaitForSelectorConfig {
    fn parse(config: &Value) -> Result<Self, ActionError> {
        let parsed: Self = parse_config("wait_for_selector", config)?;
        note_unknown_keys("wait_for_selector", &parsed.extra);
        require_non_empty("wait_for_selector", "selector", &parsed.selector)?;
        Ok(parsed)
    }
}

/// `wait_for_selector { selector, timeout_ms = 30000 }`
pub struct WaitForSelectorAction;

#[async_trait]
impl Action for WaitForSelectorAction {
    fn action_type(&self) -> &'static str {
        "wait_for_selector"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        WaitForSelectorConfig::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        _frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = WaitForSelectorConfig::parse(&config)?;
        ctx.driver
            .wait_for_selector(&config.selector, Duration::from_millis(config.timeout_ms))
            .await?;
        Ok(ActionOutput::message(format!("{} appeared", config.selector)))
    }
}

// ---------------------------------------------------------------------------
// extract_text
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExtractTextConfig {
    selector: String,
    variable: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ExtractTextConfig {
    fn parse(config: &Value) -> Result<Self, ActionError> {
        let parsed: Self = parse_config("extract_text", config)?;
        note_unknown_keys("extract_text", &parsed.extra);
        require_non_empty("extract_text", "selector", &parsed.selector)?;
        require_non_empty("extract_text", "variable", &parsed.variable)?;
        Ok(parsed)
    }
}

/// `extract_text { selector, variable }`: stores the element's text in
/// `runtime.<variable>`.
pub struct ExtractTextAction;

#[async_trait]
impl Action for ExtractTextAction {
    fn action_type(&self) -> &'static str {
        "extract_text"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        ExtractTextConfig::parse(config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        _frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config = ExtractTextConfig::parse(&config)?;
        let text = ctx.driver.text_content(&config.selector).await?;
        ctx.variables
            .set_runtime(config.variable.clone(), Value::String(text.clone()));
        Ok(
            ActionOutput::message(format!("extracted text into '{}'", config.variable))
                .with_data(json!({ "variable": config.variable, "value": text })),
        )
    }
}
