//! `actions` crate: the `Action` trait, the action registry and everything
//! an action runs against.
//!
//! Every action, built-in or plugged in, implements [`Action`] and is looked
//! up by type string through [`ActionRegistry`]. The engine crate walks an
//! automation's steps and hands each action to [`dispatch_action`], which
//! resolves `{{variables}}` in its config, executes it and emits its
//! telemetry event. Control-flow actions recurse through the same routine.

pub mod builtin;
pub mod config;
pub mod control;
pub mod definition;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod events;
pub mod mock;
pub mod registry;
pub mod storage;
pub mod traits;
pub mod variables;

pub use config::AutomationConfig;
pub use dispatch::dispatch_action;
pub use driver::{BrowserDriver, DriverError, DriverProvider, ElementCondition};
pub use error::ActionError;
pub use events::{event_channel, EventKind, EventReceiver, EventSender, RunEvent};
pub use registry::ActionRegistry;
pub use storage::{LocalStorage, StorageError, StorageService};
pub use traits::{Action, ActionOutput, ExecutionFrame, RunContext};
pub use variables::VariableContext;
