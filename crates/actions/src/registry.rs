//! Type-string keyed action registry.
//!
//! Built once by the process bootstrap, then wrapped in an `Arc` and handed
//! to the runner. Nothing registers after that point: the shared handle
//! only exposes lookups.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::traits::Action;
use crate::ActionError;

/// Produces a fresh action instance per lookup.
pub type ActionFactory = Arc<dyn Fn() -> Box<dyn Action> + Send + Sync>;

#[derive(Default, Clone)]
pub struct ActionRegistry {
    factories: BTreeMap<String, ActionFactory>,
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with every built-in action.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) the factory for `action_type`.
    pub fn register<F>(&mut self, action_type: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.factories.insert(action_type.into(), Arc::new(factory));
        self
    }

    /// Build a new instance of the action registered under `action_type`.
    ///
    /// # Errors
    /// [`ActionError::UnknownActionType`] when nothing is registered.
    pub fn get(&self, action_type: &str) -> Result<Box<dyn Action>, ActionError> {
        self.factories
            .get(action_type)
            .map(|factory| factory())
            .ok_or_else(|| ActionError::UnknownActionType(action_type.to_owned()))
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.factories.contains_key(action_type)
    }

    /// Registered type strings, sorted.
    pub fn action_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("action_types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CallLog, RecordingAction};

    #[test]
    fn unknown_type_is_reported() {
        let registry = ActionRegistry::new();
        let err = registry.get("teleport").err().expect("lookup should fail");
        assert!(matches!(err, ActionError::UnknownActionType(t) if t == "teleport"));
    }

    #[test]
    fn every_lookup_builds_a_new_instance() {
        let built = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let log = CallLog::default();

        let mut registry = ActionRegistry::new();
        registry.register("record", move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::new(RecordingAction::new(log.clone()))
        });

        let a = registry.get("record").unwrap();
        let b = registry.get("record").unwrap();
        assert_eq!(a.action_type(), "record");
        assert_eq!(b.action_type(), "record");
        assert_eq!(built.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn builtins_cover_the_catalogue() {
        let registry = ActionRegistry::with_builtins();
        for t in [
            "navigate",
            "click",
            "fill",
            "select_option",
            "wait",
            "wait_for_selector",
            "extract_text",
            "set_variable",
            "screenshot",
            "log",
            "if_else",
            "loop_until",
        ] {
            assert!(registry.contains(t), "missing builtin '{t}'");
            assert_eq!(registry.get(t).unwrap().action_type(), t);
        }
    }
}
