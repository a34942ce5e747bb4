//! `engine` crate: automation models, validation and the run orchestrator.

pub mod aggregator;
pub mod conditions;
pub mod error;
pub mod models;
pub mod notify;
pub mod runner;
pub mod store;
pub mod validation;

pub use aggregator::{LogEntry, LogStatus, ProgressAggregator, RunProgress};
pub use error::EngineError;
pub use models::{Automation, AutomationAction, AutomationRun, AutomationStep, RunStatus};
pub use notify::{NotificationMessage, Notifier, TracingNotifier};
pub use runner::{AutomationRunner, RunnerConfig};
pub use store::{MemoryRunStore, PgRunStore, RunStore};
pub use validation::validate_automation;

#[cfg(test)]
mod runner_tests;
