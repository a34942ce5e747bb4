//! `screenshot`: capture the page, upload it, report the URL.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{note_unknown_keys, parse_config};
use crate::traits::{Action, ActionOutput, ExecutionFrame, RunContext};
use crate::ActionError;

const PNG_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Default, Deserialize)]
struct ScreenshotConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    full_page: bool,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Capture a screenshot through the run's driver, upload it and emit an
/// `output_file` event for it. Returns the public URL.
///
/// Also used by the orchestrator for failure screenshots.
pub async fn capture_screenshot(
    ctx: &mut RunContext,
    frame: &ExecutionFrame,
    name: &str,
    full_page: bool,
) -> Result<String, ActionError> {
    let bytes = ctx.driver.screenshot(full_page).await?;
    let key = storage_key(ctx, frame, name);
    let url = ctx
        .storage
        .upload_file(&key, bytes, PNG_CONTENT_TYPE)
        .await?;
    ctx.emit_output_file(frame, url.clone(), format!("screenshot '{name}' saved"));
    Ok(url)
}

/// `screenshots/<automation>/<run>/loop-<n>/<name>-<millis>.png`, skipping
/// ids that are not set.
fn storage_key(ctx: &RunContext, frame: &ExecutionFrame, name: &str) -> String {
    let vars = &ctx.variables;
    let file = format!(
        "{}-{}.png",
        sanitize(name),
        chrono::Utc::now().timestamp_millis()
    );
    let loop_dir = format!("loop-{}", frame.loop_index);
    let parts: [&str; 5] = ["screenshots", &vars.automation_id, &vars.run_id, &loop_dir, &file];
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "screenshot".to_owned()
    } else {
        cleaned
    }
}

/// `screenshot { name?, full_page = false }`
pub struct ScreenshotAction;

#[async_trait]
impl Action for ScreenshotAction {
    fn action_type(&self) -> &'static str {
        "screenshot"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        parse_config::<ScreenshotConfig>("screenshot", config).map(|_| ())
    }

    async fn execute(
        &self,
        config: Value,
        frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        let config: ScreenshotConfig = parse_config("screenshot", &config)?;
        note_unknown_keys("screenshot", &config.extra);
        let name = config
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| frame.action_id.clone());

        let url = capture_screenshot(ctx, frame, &name, config.full_page).await?;
        Ok(ActionOutput::message(format!("captured screenshot '{name}'"))
            .with_data(json!({ "url": url })))
    }
}
