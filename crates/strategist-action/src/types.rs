use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use strategist_core::types::{GoalId, UserId};

use crate::error::{ActionError, ErrorKind};

// =============================================================================
// Envelope & context
// =============================================================================

/// A validated action directive extracted from model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEnvelope {
    pub action_type: String,
    /// Handler-specific fields. Always an object; `{}` when omitted.
    pub data: Map<String, Value>,
    /// Text the model wants shown instead of its own message.
    pub display_message: Option<String>,
}

impl ActionEnvelope {
    pub fn new(action_type: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            action_type: action_type.into(),
            data,
            display_message: None,
        }
    }
}

/// Who is acting, and which goal the conversation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    pub user_id: UserId,
    /// Used when a directive omits `goal_id`.
    pub default_goal_id: Option<GoalId>,
}

impl ActionContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            default_goal_id: None,
        }
    }

    pub fn with_goal(mut self, goal_id: GoalId) -> Self {
        self.default_goal_id = Some(goal_id);
        self
    }
}

// =============================================================================
// Handler output
// =============================================================================

/// What a handler produced after a successful mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutcome {
    /// Result fields merged into the action result next to `action`.
    pub fields: Map<String, Value>,
    /// Per-action confirmation shown to the user when the model gave none.
    pub acknowledgment: Option<String>,
    /// Human-readable change descriptions for the notifier.
    pub changes: Vec<String>,
    /// Goal the changes apply to.
    pub goal_id: Option<GoalId>,
}

impl HandlerOutcome {
    pub fn for_goal(goal_id: GoalId) -> Self {
        Self {
            goal_id: Some(goal_id),
            ..Self::default()
        }
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn acknowledge(mut self, message: impl Into<String>) -> Self {
        self.acknowledgment = Some(message.into());
        self
    }

    pub fn with_changes(mut self, changes: Vec<String>) -> Self {
        self.changes = changes;
        self
    }
}

// =============================================================================
// Action result
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Applied(Map<String, Value>),
    Failed { kind: ErrorKind, message: String },
}

/// Structured result of one dispatched action.
///
/// Serializes as `{"action": .., ..fields}` on success and
/// `{"action": .., "error": ..}` on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub action: String,
    pub outcome: ActionOutcome,
}

impl ActionResult {
    pub fn applied(action: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            outcome: ActionOutcome::Applied(fields),
        }
    }

    pub fn failed(action: impl Into<String>, error: &ActionError) -> Self {
        Self {
            action: action.into(),
            outcome: ActionOutcome::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Applied(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ActionOutcome::Failed { message, .. } => Some(message),
            ActionOutcome::Applied(_) => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        match &self.outcome {
            ActionOutcome::Applied(fields) => fields.get(key),
            ActionOutcome::Failed { .. } => None,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("action".to_string(), Value::String(self.action.clone()));
        match &self.outcome {
            ActionOutcome::Applied(fields) => {
                for (key, value) in fields {
                    if key != "action" {
                        map.insert(key.clone(), value.clone());
                    }
                }
            }
            ActionOutcome::Failed { message, .. } => {
                map.insert("error".to_string(), Value::String(message.clone()));
            }
        }
        Value::Object(map)
    }
}

impl Serialize for ActionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
