//! Action engine: scans model output, dispatches the directive it finds,
//! and composes the text shown to the user.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use strategist_action::{
    ActionContext, ActionDispatcher, ActionRegistry, ActionResult, ChangeNotifier, Dispatch,
};
use strategist_core::config::EngineConfig;
use strategist_storage::Database;

use crate::composer::{Composition, ResponseComposer};
use crate::scanner::Scanner;

/// What the caller shows and records for one model message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineResponse {
    pub display_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_result: Option<ActionResult>,
}

impl EngineResponse {
    fn passthrough(text: &str) -> Self {
        Self {
            display_message: text.to_string(),
            action_result: None,
        }
    }
}

pub struct ActionEngine {
    scanner: Scanner,
    dispatcher: ActionDispatcher,
    composer: ResponseComposer,
    strip_unknown: bool,
}

impl ActionEngine {
    /// Engine with the built-in goal handlers.
    pub fn new(db: Arc<Database>, config: &EngineConfig) -> Self {
        Self::with_registry(db, config, ActionRegistry::with_defaults(config))
    }

    pub fn with_registry(db: Arc<Database>, config: &EngineConfig, registry: ActionRegistry) -> Self {
        info!(actions = ?registry.action_names(), "Action engine ready");
        Self {
            scanner: Scanner::from_config(config),
            dispatcher: ActionDispatcher::new(db, registry).notify_changes(config.notify_changes),
            composer: ResponseComposer::from_config(config),
            strip_unknown: config.strip_unknown_directives,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.dispatcher = self.dispatcher.with_notifier(notifier);
        self
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Handle one model message. Never fails: problems with the directive
    /// end up in `action_result`, and the user always gets text back.
    pub fn process(&self, raw_text: &str, ctx: &ActionContext) -> EngineResponse {
        let Some(extraction) = self.scanner.scan(raw_text) else {
            return EngineResponse::passthrough(raw_text);
        };
        let directive = &raw_text[extraction.object.clone()];

        match self.dispatcher.dispatch(&extraction.envelope, ctx) {
            Dispatch::Unknown(action) => {
                if !self.strip_unknown {
                    return EngineResponse::passthrough(raw_text);
                }
                debug!(action = %action, "Removing unknown directive from text");
                let display_message = self.composer.compose(&Composition {
                    original: raw_text,
                    span: Some(extraction.span),
                    directive: Some(directive),
                    ..Composition::default()
                });
                EngineResponse {
                    display_message,
                    action_result: None,
                }
            }
            Dispatch::Completed(report) => {
                let display_message = self.composer.compose(&Composition {
                    original: raw_text,
                    span: Some(extraction.span),
                    directive: Some(directive),
                    display_message: extraction.envelope.display_message.as_deref(),
                    acknowledgment: report.acknowledgment.as_deref(),
                });
                EngineResponse {
                    display_message,
                    action_result: Some(report.result),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> ActionEngine {
        let db = Arc::new(Database::in_memory().unwrap());
        ActionEngine::new(db, &EngineConfig::default())
    }

    #[test]
    fn test_response_json_omits_missing_result() {
        let response = engine().process("Hello there", &ActionContext::new(1));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"display_message": "Hello there"})
        );
    }

    #[test]
    fn test_unknown_action_passes_text_through() {
        let text = "Sure. {\"action_type\": \"book_flight\", \"data\": {}}";
        let response = engine().process(text, &ActionContext::new(1));
        assert_eq!(response.display_message, text);
        assert!(response.action_result.is_none());
    }

    #[test]
    fn test_unknown_action_stripped_when_configured() {
        let db = Arc::new(Database::in_memory().unwrap());
        let config = EngineConfig {
            strip_unknown_directives: true,
            ..EngineConfig::default()
        };
        let engine = ActionEngine::new(db, &config);
        let response = engine.process(
            "Sure. {\"action_type\": \"book_flight\", \"data\": {}}",
            &ActionContext::new(1),
        );
        assert_eq!(response.display_message, "Sure.");
        assert!(response.action_result.is_none());
    }

    #[test]
    fn test_failed_action_shows_remaining_text() {
        let text = "Updating now. {\"action_type\": \"update_progress\", \"data\": {\"progress_value\": 20}}";
        let response = engine().process(text, &ActionContext::new(1));
        assert_eq!(response.display_message, "Updating now.");
        let result = response.action_result.unwrap();
        assert_eq!(result.error(), Some("Validation failed: goal_id is required"));
    }
}
