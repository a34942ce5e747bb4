//! Per-loop-index variable context.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{AutomationConfig, VariableKind};

/// The bag of named values available to the template resolver for one loop
/// index. Created once when the loop index starts and mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableContext {
    pub loop_index: usize,
    /// Counter of the innermost `loop_until`, rewritten by nested loops.
    pub local_loop_index: usize,
    /// Unix seconds at context creation.
    pub timestamp: i64,
    pub run_id: String,
    pub user_id: String,
    pub project_id: String,
    pub automation_id: String,
    pub static_vars: HashMap<String, String>,
    /// Values written during this loop index (`extract_text`, `set_variable`).
    pub runtime_vars: HashMap<String, Value>,
    /// Values meant to outlive a single loop; looked up after `runtime_vars`.
    pub global_vars: HashMap<String, Value>,
}

impl VariableContext {
    pub fn new(loop_index: usize) -> Self {
        Self {
            loop_index,
            timestamp: chrono::Utc::now().timestamp(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ids(
        mut self,
        run_id: impl Into<String>,
        user_id: impl Into<String>,
        project_id: impl Into<String>,
        automation_id: impl Into<String>,
    ) -> Self {
        self.run_id = run_id.into();
        self.user_id = user_id.into();
        self.project_id = project_id.into();
        self.automation_id = automation_id.into();
        self
    }

    /// Copy every `static` declared variable into `static_vars`.
    #[must_use]
    pub fn with_static_vars(mut self, config: &AutomationConfig) -> Self {
        self.static_vars.extend(
            config
                .variables
                .iter()
                .filter(|v| v.kind == VariableKind::Static)
                .map(|v| (v.key.clone(), v.value.clone())),
        );
        self
    }

    pub fn set_runtime(&mut self, name: impl Into<String>, value: Value) {
        self.runtime_vars.insert(name.into(), value);
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.global_vars.insert(name.into(), value);
    }
}
