//! Test doubles: a scriptable browser driver, an in-memory storage service
//! and a recording action.
//!
//! `MockDriver` doubles as the simulated browser behind the CLI's
//! `simulate` command, so everything here is available outside tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::AutomationConfig;
use crate::driver::{BrowserDriver, DriverError, DriverProvider, ElementCondition};
use crate::events::{event_channel, EventReceiver};
use crate::registry::ActionRegistry;
use crate::storage::{StorageError, StorageService};
use crate::traits::{Action, ActionOutput, ExecutionFrame, RunContext};
use crate::variables::VariableContext;
use crate::ActionError;

/// PNG signature followed by nothing; enough for anything that sniffs bytes.
const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

/// One call received by a [`MockDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Navigate(String),
    Click(String),
    Fill { selector: String, value: String },
    SelectOption { selector: String, value: String },
    WaitForSelector { selector: String, timeout: Duration },
    TextContent(String),
    Check { selector: String, condition: ElementCondition },
    Screenshot { full_page: bool },
    Close,
}

#[derive(Debug, Clone, Default)]
struct Script {
    texts: HashMap<String, String>,
    /// Answers popped per check; the last answer repeats forever.
    conditions: HashMap<(String, ElementCondition), VecDeque<bool>>,
    failing: HashSet<String>,
}

#[derive(Debug, Default)]
struct DriverState {
    script: Script,
    calls: Vec<DriverCall>,
}

/// An in-process browser session that records every call.
///
/// Clones share state, so a test can keep a handle after boxing the driver
/// into a run context.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<DriverState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `text_content(selector)` returns `text`.
    #[must_use]
    pub fn with_text(self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.state
            .lock()
            .script
            .texts
            .insert(selector.into(), text.into());
        self
    }

    /// Successive `check(selector, condition)` calls return `answers` in
    /// order, then keep returning the last one. Unscripted checks are false.
    #[must_use]
    pub fn with_condition(
        self,
        selector: impl Into<String>,
        condition: ElementCondition,
        answers: impl IntoIterator<Item = bool>,
    ) -> Self {
        self.state
            .lock()
            .script
            .conditions
            .insert((selector.into(), condition), answers.into_iter().collect());
        self
    }

    /// Every call targeting `target` (a selector or a URL) fails.
    #[must_use]
    pub fn failing_on(self, target: impl Into<String>) -> Self {
        self.state.lock().script.failing.insert(target.into());
        self
    }

    /// A new session with the same script and an empty call history.
    pub fn fresh(&self) -> Self {
        let script = self.state.lock().script.clone();
        Self {
            state: Arc::new(Mutex::new(DriverState {
                script,
                calls: Vec::new(),
            })),
        }
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().calls.contains(&DriverCall::Close)
    }

    fn record(&self, call: DriverCall, target: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.script.failing.contains(target) {
            return Err(DriverError::ElementNotFound(target.to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.record(DriverCall::Navigate(url.to_owned()), url)
            .map_err(|_| DriverError::Navigation {
                url: url.to_owned(),
                reason: "scripted failure".into(),
            })
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        self.record(DriverCall::Click(selector.to_owned()), selector)
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.record(
            DriverCall::Fill {
                selector: selector.to_owned(),
                value: value.to_owned(),
            },
            selector,
        )
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), DriverError> {
        self.record(
            DriverCall::SelectOption {
                selector: selector.to_owned(),
                value: value.to_owned(),
            },
            selector,
        )
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.record(
            DriverCall::WaitForSelector {
                selector: selector.to_owned(),
                timeout,
            },
            selector,
        )
        .map_err(|_| DriverError::Timeout {
            selector: selector.to_owned(),
            timeout,
        })
    }

    async fn text_content(&mut self, selector: &str) -> Result<String, DriverError> {
        self.record(DriverCall::TextContent(selector.to_owned()), selector)?;
        let text = self.state.lock().script.texts.get(selector).cloned();
        Ok(text.unwrap_or_default())
    }

    async fn check(
        &mut self,
        selector: &str,
        condition: ElementCondition,
    ) -> Result<bool, DriverError> {
        self.record(
            DriverCall::Check {
                selector: selector.to_owned(),
                condition,
            },
            selector,
        )?;
        let mut state = self.state.lock();
        let Some(answers) = state
            .script
            .conditions
            .get_mut(&(selector.to_owned(), condition))
        else {
            return Ok(false);
        };
        let answer = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().copied()
        };
        Ok(answer.unwrap_or(false))
    }

    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, DriverError> {
        self.record(DriverCall::Screenshot { full_page }, "screenshot")?;
        Ok(FAKE_PNG.to_vec())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.state.lock().calls.push(DriverCall::Close);
        Ok(())
    }
}

/// Issues a [`MockDriver::fresh`] copy of a template per loop index and
/// keeps every issued session for inspection.
#[derive(Debug, Default)]
pub struct MockDriverProvider {
    template: MockDriver,
    issued: Mutex<Vec<(usize, MockDriver)>>,
}

impl MockDriverProvider {
    pub fn new(template: MockDriver) -> Self {
        Self {
            template,
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Sessions handed out so far, in acquisition order.
    pub fn issued(&self) -> Vec<(usize, MockDriver)> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl DriverProvider for MockDriverProvider {
    async fn acquire(&self, loop_index: usize) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let driver = self.template.fresh();
        self.issued.lock().push((loop_index, driver.clone()));
        Ok(Box::new(driver))
    }
}

// ---------------------------------------------------------------------------
// MockStorage
// ---------------------------------------------------------------------------

/// Keeps uploads in memory and returns `mock://<key>` URLs.
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    uploads: Arc<Mutex<Vec<(String, usize, String)>>>,
    fail: bool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A storage whose every upload fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(key, byte length, content type)` per upload.
    pub fn uploads(&self) -> Vec<(String, usize, String)> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl StorageService for MockStorage {
    async fn upload_file(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::Other(format!("upload of '{key}' rejected")));
        }
        self.uploads
            .lock()
            .push((key.to_owned(), data.len(), content_type.to_owned()));
        Ok(format!("mock://{key}"))
    }
}

// ---------------------------------------------------------------------------
// RecordingAction
// ---------------------------------------------------------------------------

/// What a [`RecordingAction`] saw when it ran.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub action_id: String,
    pub parent_action_id: Option<String>,
    pub loop_index: usize,
    pub local_loop_index: usize,
    pub config: Value,
    pub at: tokio::time::Instant,
}

/// Shared, cloneable log of recorded calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    fn push(&self, call: RecordedCall) {
        self.0.lock().push(call);
    }
}

/// Action type `record`: appends to a [`CallLog`] and succeeds.
///
/// Config keys understood at execution time:
/// - `fail: true` fails the call;
/// - `fail_on_loop: n` fails only for loop index `n`;
/// - `delay_ms: n` sleeps before returning.
#[derive(Debug, Clone)]
pub struct RecordingAction {
    log: CallLog,
    fail_with: Option<String>,
}

impl RecordingAction {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_with: None,
        }
    }

    /// Fail every call with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn action_type(&self) -> &'static str {
        "record"
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        if config.is_null() || config.is_object() {
            Ok(())
        } else {
            Err(ActionError::invalid_config("record", "config must be an object"))
        }
    }

    async fn execute(
        &self,
        config: Value,
        frame: &ExecutionFrame,
        ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        self.log.push(RecordedCall {
            action_id: frame.action_id.clone(),
            parent_action_id: frame.parent_action_id.clone(),
            loop_index: frame.loop_index,
            local_loop_index: ctx.variables.local_loop_index,
            config: config.clone(),
            at: tokio::time::Instant::now(),
        });

        if let Some(ms) = config.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(ActionError::Failed(message.clone()));
        }
        let fail_here = config.get("fail").and_then(Value::as_bool) == Some(true)
            || config
                .get("fail_on_loop")
                .and_then(Value::as_u64)
                .is_some_and(|n| n == frame.loop_index as u64);
        if fail_here {
            return Err(ActionError::Failed(format!(
                "recorded failure in loop {}",
                frame.loop_index
            )));
        }
        Ok(ActionOutput::message(format!("recorded {}", frame.action_id)))
    }
}

/// A run context over fresh mocks: empty variables at loop index 0, default
/// automation config, a 64-slot event channel and a live cancellation token.
///
/// Returns the context, the receiving end of its event channel and a handle
/// onto its driver.
pub fn test_context(registry: ActionRegistry) -> (RunContext, EventReceiver, MockDriver) {
    let driver = MockDriver::new();
    let (events, rx) = event_channel(64);
    let ctx = RunContext {
        driver: Box::new(driver.clone()),
        storage: Arc::new(MockStorage::new()),
        events,
        variables: VariableContext::new(0),
        config: Arc::new(AutomationConfig::default()),
        registry: Arc::new(registry),
        cancel: CancellationToken::new(),
    };
    (ctx, rx, driver)
}
