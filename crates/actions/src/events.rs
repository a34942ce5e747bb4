//! Run telemetry events and the bounded, drop-on-full channel that carries them.
//!
//! Delivery is best-effort and at-most-once: producers never wait for the
//! consumer. When the buffer is full the event is discarded and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::traits::ExecutionFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Log,
    Error,
    OutputFile,
    Step,
}

/// One unit of execution telemetry. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub step_id: String,
    pub step_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub loop_index: usize,
    pub local_loop_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RunEvent {
    fn base(kind: EventKind, frame: &ExecutionFrame, local_loop_index: usize) -> Self {
        let is_action = !frame.action_id.is_empty();
        Self {
            kind,
            timestamp: Utc::now(),
            step_id: frame.step_id.clone(),
            step_name: frame.step_name.clone(),
            action_id: is_action.then(|| frame.action_id.clone()),
            action_name: is_action.then(|| frame.action_name.clone()),
            parent_action_id: frame.parent_action_id.clone(),
            action_type: is_action.then(|| frame.action_type.clone()),
            message: None,
            error: None,
            output_file: None,
            duration_ms: None,
            loop_index: frame.loop_index,
            local_loop_index,
            data: None,
        }
    }

    /// Success entry for an action or informational message.
    pub fn log(frame: &ExecutionFrame, local_loop_index: usize, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::base(EventKind::Log, frame, local_loop_index)
        }
    }

    pub fn error(frame: &ExecutionFrame, local_loop_index: usize, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(EventKind::Error, frame, local_loop_index)
        }
    }

    pub fn output_file(
        frame: &ExecutionFrame,
        local_loop_index: usize,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            output_file: Some(url.into()),
            message: Some(message.into()),
            ..Self::base(EventKind::OutputFile, frame, local_loop_index)
        }
    }

    /// Step-level marker (started / skipped). Carries no action identity.
    pub fn step(frame: &ExecutionFrame, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::base(EventKind::Step, frame, 0)
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Producer half of the event pipeline. Cheap to clone; every loop index
/// holds its own clone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<RunEvent>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half of the event pipeline.
pub type EventReceiver = mpsc::Receiver<RunEvent>;

/// Create a bounded event channel with the given buffer capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = EventSender {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

impl EventSender {
    /// Non-blocking send. Returns `false` when the event was not delivered.
    pub fn emit(&self, event: RunEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(kind = ?event.kind, "event buffer full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Number of events discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shared handle onto the drop counter, readable after every sender is gone.
    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ExecutionFrame {
        ExecutionFrame::for_step(2, "s1", "Login").child("a1", "Click submit", "click")
    }

    #[tokio::test]
    async fn emitted_events_arrive_in_order() {
        let (tx, mut rx) = event_channel(8);
        assert!(tx.emit(RunEvent::log(&frame(), 0, "first")));
        assert!(tx.emit(RunEvent::error(&frame(), 0, "second")));
        drop(tx);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.message.as_deref(), Some("first"));
        assert_eq!(second.kind, EventKind::Error);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_buffer_drops_and_counts_instead_of_blocking() {
        let (tx, _rx) = event_channel(2);
        assert!(tx.emit(RunEvent::log(&frame(), 0, "1")));
        assert!(tx.emit(RunEvent::log(&frame(), 0, "2")));
        assert!(!tx.emit(RunEvent::log(&frame(), 0, "3")));
        assert!(!tx.emit(RunEvent::log(&frame(), 0, "4")));

        assert_eq!(tx.dropped(), 2);
        assert_eq!(tx.clone().dropped(), 2, "clones share the counter");
    }

    #[test]
    fn action_events_carry_frame_identity() {
        let parent = frame();
        let nested = parent.child("a1.if_actions[0]", "Nested", "navigate");
        let event = RunEvent::log(&nested, 3, "ok").with_duration(12);

        assert_eq!(event.loop_index, 2);
        assert_eq!(event.local_loop_index, 3);
        assert_eq!(event.action_id.as_deref(), Some("a1.if_actions[0]"));
        assert_eq!(event.parent_action_id.as_deref(), Some("a1"));
        assert_eq!(event.duration_ms, Some(12));
    }

    #[test]
    fn step_events_have_no_action_identity() {
        let step = ExecutionFrame::for_step(0, "s1", "Open site");
        let event = RunEvent::step(&step, "skipped");
        assert_eq!(event.kind, EventKind::Step);
        assert!(event.action_id.is_none());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step");
        assert!(json.get("action_id").is_none());
    }
}
