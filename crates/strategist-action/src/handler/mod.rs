//! Action handler registry and trait definition.
//!
//! Defines the `ActionHandler` trait and the registry that maps an
//! envelope's `action_type` to its implementation. New action types are
//! added by registering another handler; nothing else changes.

pub mod create_goal;
pub mod save_reflections;
pub mod update_goal;
pub mod update_milestone;
pub mod update_progress;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use strategist_core::config::EngineConfig;
use strategist_storage::Connection;

use crate::error::ActionError;
use crate::types::{ActionContext, HandlerOutcome};

pub use create_goal::CreateGoalHandler;
pub use save_reflections::SaveReflectionsHandler;
pub use update_goal::UpdateGoalHandler;
pub use update_milestone::UpdateMilestoneHandler;
pub use update_progress::UpdateProgressHandler;

/// A domain mutation triggered by an action envelope.
///
/// `execute` runs inside the dispatcher's transaction: returning `Err`
/// rolls back everything the handler wrote.
pub trait ActionHandler: Send + Sync {
    /// Action names this handler answers to.
    fn action_names(&self) -> &'static [&'static str];

    fn execute(
        &self,
        conn: &Connection,
        data: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<HandlerOutcome, ActionError>;

    /// One-line description for logs.
    fn describe(&self, data: &Map<String, Value>) -> String;
}

/// Map from action name to handler.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the five goal-tracking handlers.
    pub fn with_defaults(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CreateGoalHandler::new(config.fallback_target_days)));
        registry.register(Arc::new(SaveReflectionsHandler));
        registry.register(Arc::new(UpdateProgressHandler));
        registry.register(Arc::new(UpdateMilestoneHandler));
        registry.register(Arc::new(UpdateGoalHandler::new(config.fallback_target_days)));
        registry
    }

    /// Register a handler under every name it answers to.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        for name in handler.action_names() {
            self.register_as(name, Arc::clone(&handler));
        }
    }

    /// Register a handler under one name, replacing any earlier handler.
    pub fn register_as(
        &mut self,
        name: &str,
        handler: Arc<dyn ActionHandler>,
    ) -> Option<Arc<dyn ActionHandler>> {
        let previous = self.handlers.insert(normalize(name), handler);
        if previous.is_some() {
            debug!(action = name, "Replaced action handler");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&normalize(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&normalize(name))
    }

    /// Registered names, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.action_names())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
