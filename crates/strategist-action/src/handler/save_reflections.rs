//! `save_reflection` / `save_reflections` handler.

use serde_json::{json, Map, Value};
use tracing::info;

use strategist_storage::repository;
use strategist_storage::Connection;

use crate::error::ActionError;
use crate::fields::{self, str_field};
use crate::handler::ActionHandler;
use crate::types::{ActionContext, HandlerOutcome};

/// Upserts reflections keyed by `(goal_id, reflection_type)`.
pub struct SaveReflectionsHandler;

impl ActionHandler for SaveReflectionsHandler {
    fn action_names(&self) -> &'static [&'static str] {
        &["save_reflection", "save_reflections"]
    }

    fn execute(
        &self,
        conn: &Connection,
        data: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<HandlerOutcome, ActionError> {
        let goal_id = fields::resolve_goal_id(data, ctx)?;
        let goal = fields::owned_goal(conn, goal_id, ctx.user_id)?;

        let pairs = reflection_input(data);
        if pairs.is_empty() {
            return Err(ActionError::validation(
                "save_reflections requires at least one reflection with a type and content",
            ));
        }

        let mut saved = Vec::with_capacity(pairs.len());
        let mut created = 0usize;
        for (kind, content) in &pairs {
            let upsert = repository::upsert_reflection(conn, goal.id, kind, content)?;
            if upsert.created {
                created += 1;
            }
            saved.push(upsert.reflection);
        }

        info!(
            user_id = ctx.user_id,
            goal_id = goal.id,
            saved = saved.len(),
            created,
            "Reflections saved"
        );

        let kinds: Vec<&str> = saved.iter().map(|r| r.reflection_type.as_str()).collect();
        let acknowledgment = match kinds.as_slice() {
            [single] => format!("I've saved your reflection on {} for \"{}\".", single, goal.title),
            many => format!(
                "I've saved {} reflections ({}) for \"{}\".",
                many.len(),
                many.join(", "),
                goal.title
            ),
        };

        Ok(HandlerOutcome::for_goal(goal.id)
            .field("goal_id", json!(goal.id))
            .field("reflection", serde_json::to_value(&saved[0])?)
            .field("reflections", serde_json::to_value(&saved)?)
            .acknowledge(acknowledgment))
    }

    fn describe(&self, data: &Map<String, Value>) -> String {
        let kinds: Vec<String> = reflection_input(data).into_iter().map(|(k, _)| k).collect();
        format!("Save reflections: {}", kinds.join(", "))
    }
}

/// Pairs from `reflections`, or the single `reflection_type`/`type` +
/// `content` form.
fn reflection_input(data: &Map<String, Value>) -> Vec<(String, String)> {
    if let Some(value) = data.get("reflections") {
        return fields::reflection_pairs(value);
    }
    let kind = str_field(data, "reflection_type").or_else(|| str_field(data, "type"));
    match (kind, str_field(data, "content")) {
        (Some(kind), Some(content)) => vec![(kind.to_string(), content.to_string())],
        _ => Vec::new(),
    }
}
