//! Run-completion notifications.
//!
//! The engine only decides *which* configured channels a finished run goes
//! to and builds the message; delivery is up to the [`Notifier`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use actions::config::NotificationChannelConfig;

use crate::models::{Automation, AutomationRun, RunStatus};

/// Summary of a finished run, handed to every selected channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub automation_id: Uuid,
    pub automation_name: String,
    pub run_id: Uuid,
    pub status: RunStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: String,
    pub output_file_count: usize,
    pub log_count: usize,
}

impl NotificationMessage {
    pub fn for_run(automation: &Automation, run: &AutomationRun) -> Self {
        Self {
            automation_id: automation.id,
            automation_name: automation.name.clone(),
            run_id: run.id,
            status: run.status,
            start_time: run.start_time,
            end_time: run.end_time,
            duration_ms: run.duration_ms(),
            error_message: run.error_message.clone(),
            output_file_count: run.output_files.len(),
            log_count: run.logs.len(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, message: &NotificationMessage, channels: &[NotificationChannelConfig]);
}

/// Channels subscribed to the given final status.
pub fn channels_for(
    status: RunStatus,
    channels: &[NotificationChannelConfig],
) -> Vec<NotificationChannelConfig> {
    channels
        .iter()
        .filter(|c| match status {
            RunStatus::Completed => c.on_complete,
            RunStatus::Failed | RunStatus::Cancelled => c.on_error,
            RunStatus::Pending | RunStatus::Running => false,
        })
        .cloned()
        .collect()
}

/// Writes each notification to the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn dispatch(&self, message: &NotificationMessage, channels: &[NotificationChannelConfig]) {
        for channel in channels {
            info!(
                channel = ?channel.channel,
                channel_id = %channel.id,
                run_id = %message.run_id,
                status = %message.status,
                "notification for automation '{}'",
                message.automation_name
            );
        }
    }
}
