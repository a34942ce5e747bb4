//! Variable resolution: `{{token}}` interpolation over a per-loop context.
//!
//! Lookup order for a token:
//!
//! 1. reserved names (`loopIndex`, `localLoopIndex`, `timestamp`, `runId`,
//!    `userId`, `projectId`, `automationId`)
//! 2. `runtime.<path>` against runtime then global variables
//! 3. `faker.<method>`
//! 4. `function.<name>`
//! 5. static variables copied into the context
//! 6. variables declared in the automation config
//!
//! Anything unmatched is left in place and logged.

mod context;
pub mod faker;
pub mod functions;
pub mod path;
mod resolver;

use thiserror::Error;

pub use context::VariableContext;
pub use path::{lookup_path, PathError};
pub use resolver::{resolve_in_config, resolve_in_config_except, resolve_in_string, value_to_string};

/// How deep `environment` variables may reference one another.
pub const MAX_RESOLUTION_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("variable '{key}' exceeded the maximum resolution depth ({depth})")]
    RecursionLimit { key: String, depth: usize },
}
