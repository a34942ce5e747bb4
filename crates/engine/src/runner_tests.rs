//! End-to-end tests for the automation runner.
//!
//! Everything runs in process: `MockDriverProvider` hands out simulated
//! browser sessions, `MockStorage` keeps uploads in memory and
//! `MemoryRunStore` stands in for Postgres.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use actions::config::NotificationChannelConfig;
use actions::driver::ElementCondition;
use actions::mock::{CallLog, DriverCall, MockDriver, MockDriverProvider, MockStorage, RecordingAction};
use actions::{Action, ActionError, ActionOutput, ActionRegistry, EventKind, ExecutionFrame, RunContext};

use crate::models::{Automation, AutomationAction, AutomationRun, AutomationStep, RunStatus};
use crate::notify::{NotificationMessage, Notifier};
use crate::runner::{AutomationRunner, RunnerConfig};
use crate::store::MemoryRunStore;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct PanickingAction;

#[async_trait]
impl Action for PanickingAction {
    fn action_type(&self) -> &'static str {
        "explode"
    }

    fn validate(&self, _config: &Value) -> Result<(), ActionError> {
        Ok(())
    }

    async fn execute(
        &self,
        _config: Value,
        _frame: &ExecutionFrame,
        _ctx: &mut RunContext,
    ) -> Result<ActionOutput, ActionError> {
        panic!("action exploded");
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(NotificationMessage, Vec<String>)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, message: &NotificationMessage, channels: &[NotificationChannelConfig]) {
        let ids = channels.iter().map(|c| c.id.clone()).collect();
        self.sent.lock().push((message.clone(), ids));
    }
}

struct Harness {
    runner: AutomationRunner,
    provider: Arc<MockDriverProvider>,
    storage: MockStorage,
    store: Arc<MemoryRunStore>,
    notifier: Arc<RecordingNotifier>,
    log: CallLog,
}

fn harness(template: MockDriver) -> Harness {
    let log = CallLog::default();
    let mut registry = ActionRegistry::with_builtins();
    let record_log = log.clone();
    registry.register("record", move || Box::new(RecordingAction::new(record_log.clone())));
    registry.register("explode", || Box::new(PanickingAction));

    let provider = Arc::new(MockDriverProvider::new(template));
    let storage = MockStorage::new();
    let store = Arc::new(MemoryRunStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let runner = AutomationRunner::new(
        Arc::new(registry),
        provider.clone(),
        Arc::new(storage.clone()),
        store.clone(),
        notifier.clone(),
        RunnerConfig::default(),
    );
    Harness {
        runner,
        provider,
        storage,
        store,
        notifier,
        log,
    }
}

fn action(id: &str, order: i32, action_type: &str, config: Value) -> AutomationAction {
    AutomationAction {
        id: id.into(),
        name: String::new(),
        action_type: action_type.into(),
        action_order: order,
        action_config: config,
    }
}

fn step(id: &str, order: i32, actions: Vec<AutomationAction>) -> AutomationStep {
    AutomationStep {
        id: id.into(),
        name: format!("Step {id}"),
        step_order: order,
        skip_condition: None,
        run_only_condition: None,
        probability: None,
        actions,
    }
}

fn automation(config: Value, steps: Vec<AutomationStep>) -> Automation {
    Automation::new("runner-test", Some(config.to_string()), steps)
}

fn multirun(mode: &str, count: usize, delay: u64) -> Value {
    json!({"multirun": {"enabled": true, "mode": mode, "count": count, "delay": delay}})
}

async fn execute(h: &Harness, automation: &Automation) -> (AutomationRun, Result<(), EngineError>) {
    let mut run = AutomationRun::new(automation.id);
    let result = h
        .runner
        .run_automation(automation, &mut run, CancellationToken::new())
        .await;
    (run, result)
}

fn loop_indices(log: &CallLog) -> Vec<usize> {
    log.calls().iter().map(|c| c.loop_index).collect()
}

// ---------------------------------------------------------------------------
// Multi-run modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parallel_mode_runs_every_loop_index_once() {
    let h = harness(MockDriver::new());
    let a = automation(
        multirun("parallel", 5, 0),
        vec![step("s1", 1, vec![action("a1", 1, "record", json!({}))])],
    );

    let (run, result) = execute(&h, &a).await;
    result.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.error_message.is_empty());

    let mut seen = loop_indices(&h.log);
    seen.sort_unstable();
    assert_eq!(seen, [0, 1, 2, 3, 4]);

    let issued = h.provider.issued();
    assert_eq!(issued.len(), 5, "one session per loop index");
    assert!(issued.iter().all(|(_, d)| d.is_closed()));
}

#[tokio::test(start_paused = true)]
async fn sequential_mode_runs_in_order_with_delay_between_runs() {
    let h = harness(MockDriver::new());
    let a = automation(
        multirun("sequential", 3, 500),
        vec![step("s1", 1, vec![action("a1", 1, "record", json!({}))])],
    );

    let (run, result) = execute(&h, &a).await;
    result.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let calls = h.log.calls();
    assert_eq!(loop_indices(&h.log), [0, 1, 2]);
    for pair in calls.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= Duration::from_millis(500));
    }
}

#[tokio::test]
async fn sequential_mode_stops_at_first_failing_loop() {
    let h = harness(MockDriver::new());
    let a = automation(
        multirun("sequential", 3, 0),
        vec![step(
            "s1",
            1,
            vec![action("a1", 1, "record", json!({"fail_on_loop": 1}))],
        )],
    );

    let (run, result) = execute(&h, &a).await;
    let err = result.unwrap_err();
    assert!(matches!(err, EngineError::ActionFailed { loop_index: 1, .. }));
    assert_eq!(loop_indices(&h.log), [0, 1], "loop 2 never starts");
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.contains("recorded failure in loop 1"));
    assert!(h.provider.issued().iter().all(|(_, d)| d.is_closed()));
}

#[tokio::test]
async fn parallel_mode_keeps_first_error_and_lets_other_loops_finish() {
    let h = harness(MockDriver::new());
    let a = automation(
        multirun("parallel", 4, 0),
        vec![step(
            "s1",
            1,
            vec![
                action("a1", 1, "record", json!({"fail_on_loop": 2})),
                action("a2", 2, "record", json!({})),
            ],
        )],
    );

    let (run, result) = execute(&h, &a).await;
    assert!(matches!(result, Err(EngineError::ActionFailed { loop_index: 2, .. })));
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.contains("loop 2"));

    // Loops 0, 1 and 3 ran both actions; loop 2 stopped after the first.
    let calls = h.log.calls();
    assert_eq!(calls.len(), 7);
    assert_eq!(calls.iter().filter(|c| c.loop_index == 2).count(), 1);
}

// ---------------------------------------------------------------------------
// Steps, variables and events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn skip_conditions_prevent_action_execution() {
    let h = harness(MockDriver::new());
    let mut gated = step("s1", 1, vec![action("a1", 1, "record", json!({}))]);
    gated.skip_condition = Some("loop_index_is_odd".into());
    let a = automation(multirun("sequential", 4, 0), vec![gated]);

    let (run, result) = execute(&h, &a).await;
    result.unwrap();
    assert_eq!(loop_indices(&h.log), [0, 2]);

    let skipped: Vec<usize> = run
        .logs
        .iter()
        .filter(|l| {
            l.event.kind == EventKind::Step
                && l.event.message.as_deref().is_some_and(|m| m.contains("skipped"))
        })
        .map(|l| l.event.loop_index)
        .collect();
    assert_eq!(skipped.len(), 2);
    assert!(skipped.contains(&1) && skipped.contains(&3));
}

#[tokio::test]
async fn steps_and_actions_run_in_ascending_order() {
    let h = harness(MockDriver::new());
    let a = automation(
        json!({}),
        vec![
            step("late", 2, vec![action("c", 1, "record", json!({}))]),
            step(
                "early",
                1,
                vec![
                    action("b", 7, "record", json!({})),
                    action("a", 3, "record", json!({})),
                ],
            ),
        ],
    );

    execute(&h, &a).await.1.unwrap();
    let ids: Vec<String> = h.log.calls().into_iter().map(|c| c.action_id).collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[tokio::test]
async fn variables_are_resolved_per_loop_index() {
    let h = harness(MockDriver::new());
    let mut config = multirun("sequential", 2, 0);
    config["variables"] = json!([{"key": "user", "type": "static", "value": "alice"}]);
    let a = automation(
        config,
        vec![step(
            "s1",
            1,
            vec![action(
                "a1",
                1,
                "record",
                json!({"who": "{{user}}-{{loopIndex}}", "run": "{{runId}}"}),
            )],
        )],
    );

    let (run, result) = execute(&h, &a).await;
    result.unwrap();
    let calls = h.log.calls();
    assert_eq!(calls[0].config["who"], "alice-0");
    assert_eq!(calls[1].config["who"], "alice-1");
    assert_eq!(calls[0].config["run"], run.id.to_string());
}

#[tokio::test]
async fn nested_actions_report_their_parent() {
    let driver = MockDriver::new().with_condition("#banner", ElementCondition::IsVisible, [true]);
    let h = harness(driver);
    let a = automation(
        json!({}),
        vec![step(
            "s1",
            1,
            vec![action(
                "branch",
                1,
                "if_else",
                json!({
                    "selector": "#banner",
                    "condition_type": "is_visible",
                    "if_actions": [{"type": "record"}],
                    "else_actions": [{"id": "never", "type": "record"}]
                }),
            )],
        )],
    );

    let (run, result) = execute(&h, &a).await;
    result.unwrap();
    let calls = h.log.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].action_id, "branch.if_actions[0]");
    assert_eq!(calls[0].parent_action_id.as_deref(), Some("branch"));

    let nested_log = run
        .logs
        .iter()
        .find(|l| l.event.action_id.as_deref() == Some("branch.if_actions[0]"))
        .expect("nested action logged");
    assert_eq!(nested_log.event.parent_action_id.as_deref(), Some("branch"));
    let top_log = run
        .logs
        .iter()
        .find(|l| l.event.action_id.as_deref() == Some("branch"))
        .expect("branch logged");
    assert_eq!(top_log.event.parent_action_id, None);
}

#[tokio::test]
async fn run_record_holds_aggregated_logs_and_is_persisted() {
    let h = harness(MockDriver::new());
    let a = automation(
        json!({}),
        vec![step(
            "s1",
            1,
            vec![
                action("a1", 1, "navigate", json!({"url": "https://example.com"})),
                action("a2", 2, "screenshot", json!({"name": "landing"})),
            ],
        )],
    );

    let (run, result) = execute(&h, &a).await;
    result.unwrap();

    let kinds: Vec<EventKind> = run.logs.iter().map(|l| l.event.kind).collect();
    assert_eq!(
        kinds,
        [EventKind::Step, EventKind::Log, EventKind::OutputFile, EventKind::Log]
    );
    assert_eq!(run.output_files.len(), 1);
    assert!(run.start_time.is_some() && run.end_time.is_some());

    let stored = h.store.get(run.id).expect("run persisted");
    assert_eq!(stored, run);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_action_takes_a_failure_screenshot() {
    let h = harness(MockDriver::new());
    let a = automation(
        json!({}),
        vec![step("s1", 1, vec![action("a1", 1, "record", json!({"fail": true}))])],
    );

    let (run, result) = execute(&h, &a).await;
    assert!(result.is_err());
    assert_eq!(run.status, RunStatus::Failed);

    let uploads = h.storage.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].0.contains("failure-a1"));
    assert_eq!(run.output_files.len(), 1);

    let (_, driver) = &h.provider.issued()[0];
    assert!(driver.calls().contains(&DriverCall::Screenshot { full_page: true }));
    assert!(driver.is_closed());
}

#[tokio::test]
async fn disabled_screenshots_skip_the_failure_capture() {
    let h = harness(MockDriver::new());
    let a = automation(
        json!({"screenshots": {"enabled": false}}),
        vec![step("s1", 1, vec![action("a1", 1, "record", json!({"fail": true}))])],
    );

    let (run, _) = execute(&h, &a).await;
    assert!(h.storage.uploads().is_empty());
    assert!(run.output_files.is_empty());
}

#[tokio::test]
async fn success_screenshot_is_taken_when_configured() {
    let h = harness(MockDriver::new());
    let a = automation(
        json!({"screenshots": {"on_success": true}}),
        vec![step("s1", 1, vec![action("a1", 1, "record", json!({}))])],
    );

    let (run, result) = execute(&h, &a).await;
    result.unwrap();
    assert_eq!(run.output_files.len(), 1);
    assert!(h.storage.uploads()[0].0.contains("success-loop-0"));
}

#[tokio::test]
async fn malformed_config_fails_the_run_before_any_side_effect() {
    let h = harness(MockDriver::new());
    let mut a = automation(json!({}), vec![step("s1", 1, vec![action("a1", 1, "record", json!({}))])]);
    a.config = Some("{ not json".into());

    let (run, result) = execute(&h, &a).await;
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.contains("malformed config JSON"));
    assert!(run.end_time.is_some());
    assert!(h.provider.issued().is_empty());
    assert!(h.log.is_empty());
    assert_eq!(h.store.get(run.id).unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn panicking_loop_finalizes_the_run_then_resumes_the_panic() {
    let h = harness(MockDriver::new());
    let a = automation(
        json!({}),
        vec![step(
            "s1",
            1,
            vec![
                action("a1", 1, "record", json!({})),
                action("a2", 2, "explode", json!({})),
            ],
        )],
    );

    let mut run = AutomationRun::new(a.id);
    let outcome = AssertUnwindSafe(h.runner.run_automation(&a, &mut run, CancellationToken::new()))
        .catch_unwind()
        .await;

    assert!(outcome.is_err(), "the panic reaches the caller");
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message, "unexpected runtime failure in loop 0");
    assert!(run.end_time.is_some());
    assert!(!run.logs.is_empty(), "partial logs are kept");
    assert!(h.provider.issued()[0].1.is_closed());
    assert_eq!(h.store.get(run.id).unwrap().status, RunStatus::Failed);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_before_start_yields_cancelled() {
    let h = harness(MockDriver::new());
    let a = automation(
        multirun("parallel", 3, 0),
        vec![step("s1", 1, vec![action("a1", 1, "record", json!({}))])],
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut run = AutomationRun::new(a.id);
    let result = h.runner.run_automation(&a, &mut run, cancel).await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(h.log.is_empty());
    assert!(h.provider.issued().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_observed_at_the_next_action_boundary() {
    let h = harness(MockDriver::new());
    let a = automation(
        json!({}),
        vec![step(
            "s1",
            1,
            vec![
                action("a1", 1, "record", json!({"delay_ms": 50})),
                action("a2", 2, "record", json!({})),
            ],
        )],
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let mut run = AutomationRun::new(a.id);
    let result = h.runner.run_automation(&a, &mut run, cancel).await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(h.log.len(), 1, "the in-flight action finishes, the next never starts");
    assert!(h.provider.issued()[0].1.is_closed());
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notifications_go_to_channels_subscribed_to_the_final_status() {
    let h = harness(MockDriver::new());
    let a = automation(
        json!({"notifications": [
            {"id": "on-done", "type": "webhook", "on_complete": true, "on_error": false},
            {"id": "on-fail", "type": "slack"}
        ]}),
        vec![step("s1", 1, vec![action("a1", 1, "record", json!({}))])],
    );

    let (run, result) = execute(&h, &a).await;
    result.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let sent = h.notifier.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.run_id, run.id);
    assert_eq!(sent[0].0.status, RunStatus::Completed);
    assert_eq!(sent[0].1, ["on-done"]);
}
