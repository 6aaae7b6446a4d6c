//! Helpers for reading handler fields out of `data`.
//!
//! Models emit ids as numbers, numeric strings, or unfilled placeholders
//! like `"[goal_id]"`; numbers as numbers or strings like `"40%"`. These
//! helpers accept the usable shapes and treat placeholders as absent.

use serde::Serialize;
use serde_json::{Map, Value};

use strategist_core::types::{Goal, GoalId, Milestone, MilestoneId, UserId};
use strategist_storage::repository::{self, GoalLookup};
use strategist_storage::Connection;

use crate::error::ActionError;
use crate::types::ActionContext;

/// A field the update handlers could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedField {
    pub field: String,
    pub reason: String,
}

impl RejectedField {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// `field (reason); field (reason)` for error messages.
pub fn describe_rejections(rejected: &[RejectedField]) -> String {
    rejected
        .iter()
        .map(|r| format!("{} ({})", r.field, r.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Read an integer id. Placeholders and other non-numeric values are `None`.
pub fn id_field(data: &Map<String, Value>, key: &str) -> Option<i64> {
    match data.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a number. `Ok(None)` when absent or null, `Err` when present but
/// not numeric.
pub fn number_field(data: &Map<String, Value>, key: &str) -> Result<Option<f64>, String> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => number_value(value)
            .map(Some)
            .ok_or_else(|| format!("{} must be a number", key)),
    }
}

pub fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// Read a trimmed, non-blank string.
pub fn str_field<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Whether `key` is present with a non-null value.
pub fn has_field(data: &Map<String, Value>, key: &str) -> bool {
    data.get(key).is_some_and(|v| !v.is_null())
}

/// Explicit `goal_id`, else the context default.
pub fn resolve_goal_id(
    data: &Map<String, Value>,
    ctx: &ActionContext,
) -> Result<GoalId, ActionError> {
    id_field(data, "goal_id")
        .or(ctx.default_goal_id)
        .ok_or_else(|| ActionError::validation("goal_id is required"))
}

/// Load a goal the acting user owns.
pub fn owned_goal(conn: &Connection, goal_id: GoalId, user_id: UserId) -> Result<Goal, ActionError> {
    match repository::lookup_goal(conn, goal_id, user_id)? {
        GoalLookup::Owned(goal) => Ok(goal),
        GoalLookup::Foreign { owner } => {
            tracing::debug!(goal_id, owner, user_id, "Goal owned by another user");
            Err(ActionError::Ownership {
                entity: "goal",
                id: goal_id,
            })
        }
        GoalLookup::Missing => Err(ActionError::NotFound {
            entity: "goal",
            id: goal_id,
        }),
    }
}

/// Load a milestone and check that it hangs off `goal`.
pub fn goal_milestone(
    conn: &Connection,
    goal: &Goal,
    milestone_id: MilestoneId,
) -> Result<Milestone, ActionError> {
    let milestone =
        repository::get_milestone(conn, milestone_id)?.ok_or(ActionError::NotFound {
            entity: "milestone",
            id: milestone_id,
        })?;
    if milestone.goal_id == goal.id {
        return Ok(milestone);
    }
    match repository::lookup_goal(conn, milestone.goal_id, goal.user_id)? {
        GoalLookup::Owned(_) => Err(ActionError::Validation(format!(
            "milestone {} does not belong to goal {}",
            milestone_id, goal.id
        ))),
        _ => Err(ActionError::Ownership {
            entity: "milestone",
            id: milestone_id,
        }),
    }
}

/// Reflection `(type, content)` pairs from a map `{type: content}` or a
/// list of `{type | reflection_type, content}`. Blank entries are dropped.
pub fn reflection_pairs(value: &Value) -> Vec<(String, String)> {
    let pair = |kind: &str, content: &str| {
        let (kind, content) = (kind.trim(), content.trim());
        (!kind.is_empty() && !content.is_empty()).then(|| (kind.to_string(), content.to_string()))
    };

    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(kind, content)| pair(kind, content.as_str()?))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let item = item.as_object()?;
                let kind = str_field(item, "reflection_type").or_else(|| str_field(item, "type"))?;
                pair(kind, str_field(item, "content")?)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `40` for whole numbers, `42.5` otherwise.
pub fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

pub fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_id_field_shapes() {
        let d = data(json!({"a": 4, "b": "12", "c": "[goal_id]", "d": 3.0, "e": 2.5, "f": null}));
        assert_eq!(id_field(&d, "a"), Some(4));
        assert_eq!(id_field(&d, "b"), Some(12));
        assert_eq!(id_field(&d, "c"), None);
        assert_eq!(id_field(&d, "d"), Some(3));
        assert_eq!(id_field(&d, "e"), None);
        assert_eq!(id_field(&d, "f"), None);
        assert_eq!(id_field(&d, "missing"), None);
    }

    #[test]
    fn test_number_field_shapes() {
        let d = data(json!({"a": 40, "b": "55%", "c": "lots", "d": null}));
        assert_eq!(number_field(&d, "a"), Ok(Some(40.0)));
        assert_eq!(number_field(&d, "b"), Ok(Some(55.0)));
        assert_eq!(number_field(&d, "c"), Err("c must be a number".to_string()));
        assert_eq!(number_field(&d, "d"), Ok(None));
        assert_eq!(number_field(&d, "x"), Ok(None));
    }

    #[test]
    fn test_resolve_goal_id_falls_back_to_context() {
        let ctx = ActionContext::new(1).with_goal(9);
        assert_eq!(resolve_goal_id(&data(json!({"goal_id": 3})), &ctx).unwrap(), 3);
        assert_eq!(
            resolve_goal_id(&data(json!({"goal_id": "[goal_id]"})), &ctx).unwrap(),
            9
        );
        let err = resolve_goal_id(&data(json!({})), &ActionContext::new(1)).unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[test]
    fn test_reflection_pairs_from_map_and_list() {
        let from_map = reflection_pairs(&json!({"importance": "Health", "obstacles": "  "}));
        assert_eq!(from_map, vec![("importance".to_string(), "Health".to_string())]);

        let from_list = reflection_pairs(&json!([
            {"type": "importance", "content": "Health"},
            {"reflection_type": "timeline", "content": "By summer"},
            {"type": "obstacles"},
            "not an object"
        ]));
        assert_eq!(from_list.len(), 2);
        assert_eq!(from_list[1].0, "timeline");

        assert!(reflection_pairs(&json!("text")).is_empty());
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_percent(40.0), "40");
        assert_eq!(format_percent(42.5), "42.5");
        assert_eq!(plural(1, "milestone"), "1 milestone");
        assert_eq!(plural(3, "milestone"), "3 milestones");
    }
}
