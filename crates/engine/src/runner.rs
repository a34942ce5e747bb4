//! Automation run orchestrator.
//!
//! `AutomationRunner` drives one automation run end to end:
//! 1. Parses the automation config and decides run count and mode.
//! 2. Starts the event channel and the progress aggregator.
//! 3. Runs every loop index on its own task, sequentially or in parallel,
//!    each with an exclusive browser session.
//! 4. Finalizes the run record, persists it and dispatches notifications.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use actions::builtin::capture_screenshot;
use actions::config::{AutomationConfig, RunMode};
use actions::{
    dispatch_action, event_channel, ActionRegistry, DriverProvider, EventSender, ExecutionFrame,
    RunContext, RunEvent, StorageService, VariableContext,
};

use crate::aggregator::ProgressAggregator;
use crate::conditions::should_skip;
use crate::models::{Automation, AutomationRun, RunStatus};
use crate::notify::{channels_for, NotificationMessage, Notifier};
use crate::store::RunStore;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Process-level tuning knobs for the runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Capacity of the per-run event channel. Events beyond it are dropped.
    pub event_buffer: usize,
    /// How often in-flight progress is written to the run store.
    pub flush_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            event_buffer: 1000,
            flush_interval: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Loop-index execution
// ---------------------------------------------------------------------------

type PanicPayload = Box<dyn Any + Send + 'static>;

/// How one loop index ended.
enum LoopOutcome {
    Finished(Result<(), EngineError>),
    Panicked(PanicPayload),
}

/// Everything the loop-index tasks of one run share. Read-only.
struct LoopShared {
    automation: Automation,
    config: Arc<AutomationConfig>,
    registry: Arc<ActionRegistry>,
    drivers: Arc<dyn DriverProvider>,
    storage: Arc<dyn StorageService>,
    events: EventSender,
    cancel: CancellationToken,
    run_id: String,
}

impl LoopShared {
    /// Execute loop index `loop_index` with its own browser session.
    ///
    /// The session is closed on every exit path; a panic in the steps is
    /// caught here so the session can be released, then handed back.
    async fn run(self: Arc<Self>, loop_index: usize) -> LoopOutcome {
        if self.cancel.is_cancelled() {
            return LoopOutcome::Finished(Err(EngineError::Cancelled));
        }

        let driver = match self.drivers.acquire(loop_index).await {
            Ok(driver) => driver,
            Err(source) => {
                return LoopOutcome::Finished(Err(EngineError::Driver { loop_index, source }))
            }
        };

        let automation = &self.automation;
        let variables = VariableContext::new(loop_index)
            .with_ids(
                self.run_id.clone(),
                automation.user_id.to_string(),
                automation.project_id.to_string(),
                automation.id.to_string(),
            )
            .with_static_vars(&self.config);

        let mut ctx = RunContext {
            driver,
            storage: Arc::clone(&self.storage),
            events: self.events.clone(),
            variables,
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            cancel: self.cancel.clone(),
        };

        let result = AssertUnwindSafe(self.run_steps(&mut ctx, loop_index))
            .catch_unwind()
            .await;

        if let Err(e) = ctx.driver.close().await {
            warn!(loop_index, "failed to close browser session: {e}");
        }

        match result {
            Ok(result) => LoopOutcome::Finished(result),
            Err(payload) => LoopOutcome::Panicked(payload),
        }
    }

    async fn run_steps(&self, ctx: &mut RunContext, loop_index: usize) -> Result<(), EngineError> {
        let mut last_frame = None;

        for step in self.automation.sorted_steps() {
            if ctx.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let step_name = if step.name.is_empty() { &step.id } else { &step.name };
            let frame = ExecutionFrame::for_step(loop_index, &step.id, step_name);

            if should_skip(
                step.skip_condition.as_deref(),
                step.run_only_condition.as_deref(),
                loop_index,
                step.probability,
            ) {
                debug!(loop_index, step_id = %step.id, "step skipped");
                ctx.events.emit(RunEvent::step(
                    &frame,
                    format!("step '{step_name}' skipped for loop {loop_index}"),
                ));
                continue;
            }
            ctx.events
                .emit(RunEvent::step(&frame, format!("step '{step_name}' started")));

            for action in step.sorted_actions() {
                if ctx.cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }

                let action_name = if action.name.is_empty() {
                    &action.action_type
                } else {
                    &action.name
                };
                let action_frame =
                    frame.child(action.id.as_str(), action_name.as_str(), action.action_type.as_str());

                if let Err(source) = dispatch_action(&action_frame, &action.action_config, ctx).await
                {
                    if !source.is_cancelled() {
                        self.failure_screenshot(ctx, &action_frame).await;
                    }
                    return Err(EngineError::ActionFailed {
                        loop_index,
                        step: step.id.clone(),
                        action: action.id.clone(),
                        source,
                    });
                }
            }
            last_frame = Some(frame);
        }

        let shots = &self.config.screenshots;
        if shots.enabled && shots.on_success {
            if let Some(frame) = last_frame {
                let name = format!("success-loop-{loop_index}");
                if let Err(e) = capture_screenshot(ctx, &frame, &name, true).await {
                    warn!(loop_index, "success screenshot failed: {e}");
                }
            }
        }
        Ok(())
    }

    /// Best effort: a failed capture is logged and otherwise ignored.
    async fn failure_screenshot(&self, ctx: &mut RunContext, frame: &ExecutionFrame) {
        let shots = &self.config.screenshots;
        if !(shots.enabled && shots.on_error) {
            return;
        }
        let name = format!("failure-{}", frame.action_id);
        if let Err(e) = capture_screenshot(ctx, frame, &name, true).await {
            warn!(
                loop_index = frame.loop_index,
                action_id = %frame.action_id,
                "failure screenshot failed: {e}"
            );
        }
    }
}

/// Outcome collection across loop indices.
#[derive(Default)]
struct Collected {
    first_error: Option<EngineError>,
    panic: Option<(usize, PanicPayload)>,
}

impl Collected {
    fn record(&mut self, loop_index: usize, outcome: LoopOutcome) {
        match outcome {
            LoopOutcome::Finished(Ok(())) => debug!(loop_index, "loop completed"),
            LoopOutcome::Finished(Err(e)) => {
                error!(loop_index, "loop failed: {e}");
                self.first_error.get_or_insert(e);
            }
            LoopOutcome::Panicked(payload) => {
                error!(loop_index, "loop panicked");
                if self.panic.is_none() {
                    self.panic = Some((loop_index, payload));
                }
            }
        }
    }

    fn stop(&self) -> bool {
        self.first_error.is_some() || self.panic.is_some()
    }
}

// ---------------------------------------------------------------------------
// AutomationRunner
// ---------------------------------------------------------------------------

/// Runs automations against injected drivers, storage, store and notifier.
///
/// Holds no per-run state; one runner serves any number of runs.
pub struct AutomationRunner {
    registry: Arc<ActionRegistry>,
    drivers: Arc<dyn DriverProvider>,
    storage: Arc<dyn StorageService>,
    store: Arc<dyn RunStore>,
    notifier: Arc<dyn Notifier>,
    config: RunnerConfig,
}

impl AutomationRunner {
    pub fn new(
        registry: Arc<ActionRegistry>,
        drivers: Arc<dyn DriverProvider>,
        storage: Arc<dyn StorageService>,
        store: Arc<dyn RunStore>,
        notifier: Arc<dyn Notifier>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            registry,
            drivers,
            storage,
            store,
            notifier,
            config,
        }
    }

    /// Execute `automation` and record the outcome in `run`.
    ///
    /// `run` is finalized exactly once whatever happens. A panic in a loop
    /// index finalizes the run as failed and is then resumed.
    ///
    /// # Errors
    /// The config error, or the first error observed across loop indices.
    #[instrument(skip_all, fields(automation_id = %automation.id, run_id = %run.id))]
    pub async fn run_automation(
        &self,
        automation: &Automation,
        run: &mut AutomationRun,
        cancel: CancellationToken,
    ) -> Result<(), EngineError> {
        let config = match AutomationConfig::parse(automation.config.as_deref()) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                let err = EngineError::InvalidConfig(e.to_string());
                error!("automation config rejected: {err}");
                let now = Utc::now();
                run.status = RunStatus::Failed;
                run.start_time.get_or_insert(now);
                run.end_time = Some(now);
                run.error_message = err.to_string();
                self.persist(run).await;
                return Err(err);
            }
        };

        let count = config.run_count();
        let mode = config.run_mode();
        let delay = Duration::from_millis(config.multirun.delay);
        info!(count, ?mode, "starting automation '{}'", automation.name);

        run.status = RunStatus::Running;
        run.start_time = Some(Utc::now());
        self.persist(run).await;

        let (events, rx) = event_channel(self.config.event_buffer);
        let aggregator = ProgressAggregator::spawn(
            rx,
            Arc::clone(&self.store),
            run.id,
            self.config.flush_interval,
            cancel.clone(),
            events.drop_counter(),
        );

        let shared = Arc::new(LoopShared {
            automation: automation.clone(),
            config: Arc::clone(&config),
            registry: Arc::clone(&self.registry),
            drivers: Arc::clone(&self.drivers),
            storage: Arc::clone(&self.storage),
            events,
            cancel: cancel.clone(),
            run_id: run.id.to_string(),
        });

        let collected = match mode {
            RunMode::Sequential => Self::run_sequential(&shared, count, delay, &cancel).await,
            RunMode::Parallel => Self::run_parallel(&shared, count).await,
        };
        // Last sender goes away with `shared`; the aggregator can now drain.
        drop(shared);
        let progress = aggregator.finish().await;

        run.logs = progress.logs;
        run.output_files = progress.output_files;
        run.end_time = Some(Utc::now());

        let Collected { first_error, panic } = collected;
        if let Some((loop_index, payload)) = panic {
            run.status = RunStatus::Failed;
            run.error_message = format!("unexpected runtime failure in loop {loop_index}");
            self.persist(run).await;
            self.notify(automation, run, &config);
            std::panic::resume_unwind(payload);
        }

        if let Some(e) = &first_error {
            run.error_message = e.to_string();
        }
        run.status = match &first_error {
            Some(e) if e.is_cancelled() => RunStatus::Cancelled,
            Some(_) => RunStatus::Failed,
            None if !run.error_message.is_empty() => RunStatus::Failed,
            None => RunStatus::Completed,
        };
        info!(
            status = %run.status,
            logs = run.logs.len(),
            output_files = run.output_files.len(),
            "automation run finished"
        );
        self.persist(run).await;
        self.notify(automation, run, &config);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn run_sequential(
        shared: &Arc<LoopShared>,
        count: usize,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Collected {
        let mut collected = Collected::default();
        for loop_index in 0..count {
            if loop_index > 0 && !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
            let task = tokio::spawn(Arc::clone(shared).run(loop_index));
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => LoopOutcome::Panicked(e.into_panic()),
                Err(e) => LoopOutcome::Finished(Err(e.into())),
            };
            collected.record(loop_index, outcome);
            if collected.stop() {
                break;
            }
        }
        collected
    }

    async fn run_parallel(shared: &Arc<LoopShared>, count: usize) -> Collected {
        let mut tasks = JoinSet::new();
        for loop_index in 0..count {
            let shared = Arc::clone(shared);
            tasks.spawn(async move { (loop_index, shared.run(loop_index).await) });
        }

        let mut collected = Collected::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((loop_index, outcome)) => collected.record(loop_index, outcome),
                Err(e) => {
                    error!("loop task failed: {e}");
                    collected.first_error.get_or_insert(EngineError::Join(e));
                }
            }
        }
        collected
    }

    async fn persist(&self, run: &AutomationRun) {
        if let Err(e) = self.store.save_run(run).await {
            warn!(run_id = %run.id, status = %run.status, "failed to persist run: {e}");
        }
    }

    /// Fire-and-forget dispatch to the channels subscribed to the final status.
    fn notify(&self, automation: &Automation, run: &AutomationRun, config: &AutomationConfig) {
        let channels = channels_for(run.status, &config.notifications);
        if channels.is_empty() {
            return;
        }
        let message = NotificationMessage::for_run(automation, run);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.dispatch(&message, &channels).await;
        });
    }
}
