use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, StagehandError};
use crate::executors::{self, Executor, ExecutorDescriptor};
use crate::types::ActionType;

/// Lookup table from action type to executor.
///
/// Constructed explicitly and shared through the execution context; there is
/// no process-wide instance.
#[derive(Default)]
pub struct Registry {
    executors: HashMap<ActionType, Arc<dyn Executor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in executor.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for executor in executors::builtins() {
            registry.register(executor);
        }
        registry
    }

    /// Store `executor` under its action type. Replacing an existing
    /// executor is allowed and logged.
    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        let action_type = executor.descriptor().action_type;
        if self.executors.insert(action_type, executor).is_some() {
            tracing::warn!(action = %action_type, "executor re-registered; previous one replaced");
        }
    }

    pub fn get(&self, action_type: ActionType) -> Result<Arc<dyn Executor>> {
        self.executors
            .get(&action_type)
            .cloned()
            .ok_or_else(|| StagehandError::UnknownAction(action_type.to_string()))
    }

    /// Resolve a type written as text, e.g. from a sequence step.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<dyn Executor>> {
        let action_type: ActionType = type_name.parse()?;
        self.get(action_type)
    }

    pub fn has(&self, action_type: ActionType) -> bool {
        self.executors.contains_key(&action_type)
    }

    /// Descriptors of all registered executors, sorted by type id.
    pub fn list(&self) -> Vec<ExecutorDescriptor> {
        let mut descriptors: Vec<_> = self.executors.values().map(|e| e.descriptor()).collect();
        descriptors.sort_by(|a, b| a.action_type.as_str().cmp(b.action_type.as_str()));
        descriptors
    }

    pub fn size(&self) -> usize {
        self.executors.len()
    }

    pub fn clear(&mut self) {
        self.executors.clear();
    }
}
