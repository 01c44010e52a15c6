// Permission gate - resolves the effective mode of a tool

use super::{PermissionMode, PermissionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Decides per tool whether an action is allowed, denied or needs confirmation.
///
/// Resolution order: the persisted store, then the default registered for
/// the tool, then `Ask`. An unknown tool never resolves to `Allow`.
pub struct PermissionGate {
    store: Arc<dyn PermissionStore>,
    defaults: HashMap<String, PermissionMode>,
}

impl PermissionGate {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            defaults: HashMap::new(),
        }
    }

    /// Register built-in defaults, usually from the tool definitions
    pub fn with_defaults<I, S>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = (S, PermissionMode)>,
        S: Into<String>,
    {
        self.defaults
            .extend(defaults.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn decide(&self, tool: &str) -> PermissionMode {
        let mode = self
            .store
            .mode(tool)
            .or_else(|| self.defaults.get(tool).copied())
            .unwrap_or(PermissionMode::Ask);
        debug!(tool = %tool, mode = %mode, "permission decided");
        mode
    }

    pub fn can_execute(&self, tool: &str) -> bool {
        self.decide(tool) != PermissionMode::Deny
    }

    pub fn needs_confirmation(&self, tool: &str) -> bool {
        self.decide(tool) == PermissionMode::Ask
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }
}
