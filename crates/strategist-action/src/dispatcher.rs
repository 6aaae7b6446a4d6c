//! Action dispatcher.
//!
//! Looks an envelope's `action_type` up in the registry and runs the
//! handler inside one transaction. Errors and panics are turned into a
//! failed `ActionResult`; nothing propagates to the caller.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use strategist_storage::Database;

use crate::error::{ActionError, ErrorKind};
use crate::handler::ActionRegistry;
use crate::notifier::{ChangeEvent, ChangeNotifier, LogNotifier};
use crate::types::{ActionContext, ActionEnvelope, ActionResult};

/// Outcome of dispatching one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// No handler is registered for this action type.
    Unknown(String),
    Completed(DispatchReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub result: ActionResult,
    /// The handler's confirmation message; `None` on failure.
    pub acknowledgment: Option<String>,
    pub changes: Vec<String>,
}

pub struct ActionDispatcher {
    db: Arc<Database>,
    registry: ActionRegistry,
    notifier: Arc<dyn ChangeNotifier>,
    notify_changes: bool,
}

impl ActionDispatcher {
    pub fn new(db: Arc<Database>, registry: ActionRegistry) -> Self {
        Self {
            db,
            registry,
            notifier: Arc::new(LogNotifier),
            notify_changes: true,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn notify_changes(mut self, enabled: bool) -> Self {
        self.notify_changes = enabled;
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Run the handler registered for `envelope.action_type`.
    pub fn dispatch(&self, envelope: &ActionEnvelope, ctx: &ActionContext) -> Dispatch {
        let action = envelope.action_type.as_str();
        let Some(handler) = self.registry.get(action) else {
            warn!(action, user_id = ctx.user_id, "Unknown action type, ignoring");
            return Dispatch::Unknown(envelope.action_type.clone());
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            debug!(
                action,
                user_id = ctx.user_id,
                "Dispatching: {}",
                handler.describe(&envelope.data)
            );
            self.db
                .with_transaction(|tx| handler.execute(tx, &envelope.data, ctx))
        }))
        .unwrap_or_else(|payload| Err(ActionError::Panicked(panic_message(payload))));

        match outcome {
            Ok(outcome) => {
                info!(action, user_id = ctx.user_id, goal_id = ?outcome.goal_id, "Action applied");
                if self.notify_changes && !outcome.changes.is_empty() {
                    self.notify(ChangeEvent {
                        user_id: ctx.user_id,
                        goal_id: outcome.goal_id,
                        action: action.to_string(),
                        changes: outcome.changes.clone(),
                    });
                }
                Dispatch::Completed(DispatchReport {
                    result: ActionResult::applied(action, outcome.fields),
                    acknowledgment: outcome.acknowledgment,
                    changes: outcome.changes,
                })
            }
            Err(err) => {
                log_failure(action, ctx, &err);
                Dispatch::Completed(DispatchReport {
                    result: ActionResult::failed(action, &err),
                    acknowledgment: None,
                    changes: Vec::new(),
                })
            }
        }
    }

    fn notify(&self, event: ChangeEvent) {
        let notifier = Arc::clone(&self.notifier);
        if panic::catch_unwind(AssertUnwindSafe(|| notifier.notify(&event))).is_err() {
            error!(action = %event.action, user_id = event.user_id, "Change notifier panicked");
        }
    }
}

fn log_failure(action: &str, ctx: &ActionContext, err: &ActionError) {
    let user_id = ctx.user_id;
    match err.kind() {
        ErrorKind::Validation | ErrorKind::NotFound => {
            warn!(action, user_id, error = %err, "Action rejected")
        }
        ErrorKind::Ownership => {
            warn!(audit = true, action, user_id, error = %err, "Action denied: not the owner")
        }
        ErrorKind::Persistence => error!(action, user_id, error = %err, "Action failed to persist"),
        ErrorKind::Internal => error!(action, user_id, error = %err, "Action handler panicked"),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{reload_goal, seed_goal};
    use crate::handler::ActionHandler;
    use crate::notifier::RecordingNotifier;
    use crate::types::HandlerOutcome;
    use serde_json::{json, Map, Value};
    use strategist_core::config::EngineConfig;
    use strategist_storage::{repository, Connection};

    struct ExplodingHandler;

    impl ActionHandler for ExplodingHandler {
        fn action_names(&self) -> &'static [&'static str] {
            &["explode"]
        }

        fn execute(
            &self,
            conn: &Connection,
            _data: &Map<String, Value>,
            ctx: &ActionContext,
        ) -> Result<HandlerOutcome, ActionError> {
            let goal_id = ctx.default_goal_id.unwrap_or_default();
            conn.execute("UPDATE goals SET title = 'half-written' WHERE id = ?1", [goal_id])
                .unwrap();
            panic!("handler bug");
        }

        fn describe(&self, _data: &Map<String, Value>) -> String {
            "explode".to_string()
        }
    }

    struct GarbledDescriptionHandler;

    impl ActionHandler for GarbledDescriptionHandler {
        fn action_names(&self) -> &'static [&'static str] {
            &["garbled"]
        }

        fn execute(
            &self,
            _conn: &Connection,
            _data: &Map<String, Value>,
            _ctx: &ActionContext,
        ) -> Result<HandlerOutcome, ActionError> {
            Ok(HandlerOutcome::default())
        }

        fn describe(&self, data: &Map<String, Value>) -> String {
            format!("garbled {}", data["title"])
        }
    }

    fn dispatcher() -> (Arc<Database>, ActionDispatcher) {
        let db = Arc::new(Database::in_memory().unwrap());
        let mut registry = ActionRegistry::with_defaults(&EngineConfig::default());
        registry.register(Arc::new(ExplodingHandler));
        registry.register(Arc::new(GarbledDescriptionHandler));
        let dispatcher = ActionDispatcher::new(Arc::clone(&db), registry);
        (db, dispatcher)
    }

    fn envelope(action: &str, data: Value) -> ActionEnvelope {
        ActionEnvelope::new(action, data.as_object().cloned().unwrap())
    }

    fn completed(dispatch: Dispatch) -> DispatchReport {
        match dispatch {
            Dispatch::Completed(report) => report,
            Dispatch::Unknown(action) => panic!("unexpected unknown action {}", action),
        }
    }

    #[test]
    fn test_unknown_action() {
        let (_db, dispatcher) = dispatcher();
        let dispatch = dispatcher.dispatch(&envelope("launch_rocket", json!({})), &ActionContext::new(1));
        assert_eq!(dispatch, Dispatch::Unknown("launch_rocket".to_string()));
    }

    #[test]
    fn test_successful_dispatch() {
        let (db, dispatcher) = dispatcher();
        let goal = seed_goal(&db, 1, "Run 5k");
        let report = completed(dispatcher.dispatch(
            &envelope("update_progress", json!({"goal_id": goal.id, "progress_value": 25})),
            &ActionContext::new(1),
        ));
        assert!(report.result.is_success());
        assert_eq!(report.result.to_value()["action"], "update_progress");
        assert!(report.acknowledgment.is_some());
    }

    #[test]
    fn test_failed_dispatch_rolls_back() {
        let (db, dispatcher) = dispatcher();
        let goal = seed_goal(&db, 1, "Run 5k");
        let report = completed(dispatcher.dispatch(
            &envelope("update_goal", json!({"goal_id": goal.id, "title": " ", "status": "nope"})),
            &ActionContext::new(1),
        ));
        assert!(!report.result.is_success());
        assert!(report.result.error().unwrap().starts_with("Validation failed"));
        assert!(report.acknowledgment.is_none());
        assert_eq!(reload_goal(&db, &goal).title, "Run 5k");
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let (db, dispatcher) = dispatcher();
        let goal = seed_goal(&db, 1, "Run 5k");
        let ctx = ActionContext::new(1).with_goal(goal.id);

        let report = completed(dispatcher.dispatch(&envelope("explode", json!({})), &ctx));
        assert_eq!(
            report.result.error(),
            Some("Action handler panicked: handler bug")
        );
        assert_eq!(reload_goal(&db, &goal).title, "Run 5k");

        // The database is still usable afterwards.
        let report = completed(dispatcher.dispatch(
            &envelope("update_progress", json!({"progress_value": 10})),
            &ctx,
        ));
        assert!(report.result.is_success());
    }

    #[test]
    fn test_panicking_describe_is_contained() {
        let (_db, dispatcher) = dispatcher();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();

        let report = tracing::subscriber::with_default(subscriber, || {
            completed(dispatcher.dispatch(&envelope("garbled", json!({})), &ActionContext::new(1)))
        });
        let error = report.result.error().unwrap();
        assert!(error.starts_with("Action handler panicked"), "got {}", error);
    }

    #[test]
    fn test_changes_forwarded_to_notifier() {
        let (db, dispatcher) = dispatcher();
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = dispatcher.with_notifier(notifier.clone());
        let goal = seed_goal(&db, 1, "Run 5k");

        dispatcher.dispatch(
            &envelope("update_goal", json!({"goal_id": goal.id, "title": "Run 10k"})),
            &ActionContext::new(1),
        );
        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].goal_id, Some(goal.id));
        assert_eq!(events[0].changes, vec!["Title changed from 'Run 5k' to 'Run 10k'".to_string()]);
    }

    #[test]
    fn test_notifications_can_be_disabled() {
        let (db, dispatcher) = dispatcher();
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = dispatcher.with_notifier(notifier.clone()).notify_changes(false);
        let goal = seed_goal(&db, 1, "Run 5k");

        dispatcher.dispatch(
            &envelope("update_goal", json!({"goal_id": goal.id, "title": "Run 10k"})),
            &ActionContext::new(1),
        );
        assert!(notifier.events().is_empty());
    }

    #[test]
    fn test_ownership_failure_result() {
        let (db, dispatcher) = dispatcher();
        let theirs = seed_goal(&db, 2, "Theirs");
        let report = completed(dispatcher.dispatch(
            &envelope("update_progress", json!({"goal_id": theirs.id, "progress_value": 50})),
            &ActionContext::new(1),
        ));
        assert_eq!(
            report.result.to_value(),
            json!({"action": "update_progress", "error": format!("goal {} is not accessible", theirs.id)})
        );
        let history = db
            .with_conn(|conn| repository::list_progress_updates(conn, theirs.id, 10))
            .unwrap();
        assert!(history.is_empty());
    }
}
