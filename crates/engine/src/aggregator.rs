//! Run progress aggregation.
//!
//! One background task per automation run drains the event channel shared by
//! every loop index, classifies each event into a [`LogEntry`] and keeps the
//! accumulated logs and output files behind a lock. Snapshots are flushed to
//! the [`RunStore`] on a fixed interval, once when the run is cancelled and a
//! last time when the channel closes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use actions::{EventKind, EventReceiver, RunEvent};

use crate::store::RunStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
    Info,
}

impl LogStatus {
    pub fn classify(kind: EventKind) -> Self {
        match kind {
            EventKind::Log | EventKind::OutputFile => Self::Success,
            EventKind::Error => Self::Failure,
            EventKind::Step => Self::Info,
        }
    }
}

/// A persisted log line: the event itself plus its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(flatten)]
    pub event: RunEvent,
    pub status: LogStatus,
}

impl From<RunEvent> for LogEntry {
    fn from(event: RunEvent) -> Self {
        let status = LogStatus::classify(event.kind);
        Self { event, status }
    }
}

/// What the aggregator has collected so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunProgress {
    pub logs: Vec<LogEntry>,
    pub output_files: Vec<String>,
    /// Events producers discarded because the channel was full.
    pub dropped_events: u64,
}

impl RunProgress {
    fn record(&mut self, event: RunEvent) {
        if event.kind == EventKind::OutputFile {
            if let Some(url) = &event.output_file {
                self.output_files.push(url.clone());
            }
        }
        self.logs.push(LogEntry::from(event));
    }
}

/// Handle onto the running aggregation task.
pub struct ProgressAggregator {
    state: Arc<Mutex<RunProgress>>,
    task: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

impl ProgressAggregator {
    /// Start draining `rx` in the background.
    ///
    /// The task ends once every sender has been dropped and the buffer is
    /// empty; `cancel` only triggers an early flush, draining continues.
    pub fn spawn(
        rx: EventReceiver,
        store: Arc<dyn RunStore>,
        run_id: Uuid,
        flush_interval: Duration,
        cancel: CancellationToken,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        let state = Arc::new(Mutex::new(RunProgress::default()));
        let task = tokio::spawn(drain(
            rx,
            Arc::clone(&state),
            store,
            run_id,
            flush_interval,
            cancel,
        ));
        Self {
            state,
            task,
            dropped,
        }
    }

    /// Copy of the progress collected so far.
    pub fn snapshot(&self) -> RunProgress {
        let mut progress = self.state.lock().clone();
        progress.dropped_events = self.dropped.load(Ordering::Relaxed);
        progress
    }

    /// Wait for the channel to drain and return the final progress.
    ///
    /// Callers must drop their senders first or this never returns.
    pub async fn finish(self) -> RunProgress {
        if let Err(e) = self.task.await {
            warn!("progress aggregator task ended abnormally: {e}");
        }
        let dropped_events = self.dropped.load(Ordering::Relaxed);
        let mut progress = std::mem::take(&mut *self.state.lock());
        progress.dropped_events = dropped_events;
        info!(
            logs = progress.logs.len(),
            output_files = progress.output_files.len(),
            dropped_events,
            "progress aggregation finished"
        );
        progress
    }
}

async fn drain(
    mut rx: EventReceiver,
    state: Arc<Mutex<RunProgress>>,
    store: Arc<dyn RunStore>,
    run_id: Uuid,
    flush_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut dirty = false;
    let mut cancel_seen = false;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    state.lock().record(event);
                    dirty = true;
                }
                None => break,
            },
            _ = ticker.tick() => {
                if dirty {
                    flush(&state, store.as_ref(), run_id).await;
                    dirty = false;
                }
            }
            _ = cancel.cancelled(), if !cancel_seen => {
                cancel_seen = true;
                debug!(%run_id, "run cancelled, flushing progress");
                flush(&state, store.as_ref(), run_id).await;
                dirty = false;
            }
        }
    }

    flush(&state, store.as_ref(), run_id).await;
}

async fn flush(state: &Mutex<RunProgress>, store: &dyn RunStore, run_id: Uuid) {
    let (logs, output_files) = {
        let progress = state.lock();
        (progress.logs.clone(), progress.output_files.clone())
    };
    if let Err(e) = store.save_progress(run_id, &logs, &output_files).await {
        warn!(%run_id, "failed to persist run progress: {e}");
    }
}
