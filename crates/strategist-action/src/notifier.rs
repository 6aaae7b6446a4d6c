//! Outbound change notifications.
//!
//! Update handlers describe what they changed; the dispatcher forwards
//! those descriptions to a `ChangeNotifier` after the transaction commits.

use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

use strategist_core::types::{GoalId, UserId};

/// Committed changes from one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub user_id: UserId,
    pub goal_id: Option<GoalId>,
    pub action: String,
    pub changes: Vec<String>,
}

pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, event: &ChangeEvent);
}

/// Writes each change to the log.
pub struct LogNotifier;

impl ChangeNotifier for LogNotifier {
    fn notify(&self, event: &ChangeEvent) {
        for change in &event.changes {
            info!(
                user_id = event.user_id,
                goal_id = ?event.goal_id,
                action = %event.action,
                change = %change,
                "Goal change"
            );
        }
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn notify(&self, event: &ChangeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
