//! `update_goal` handler.
//!
//! Same partial-application policy as `update_milestone`. Every applied
//! field produces a change description for the notifier.

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use strategist_core::types::{check_percent, GoalStatus};
use strategist_storage::repository;
use strategist_storage::Connection;

use crate::dates;
use crate::error::ActionError;
use crate::fields::{
    self, describe_rejections, format_percent, has_field, number_value, str_field, RejectedField,
};
use crate::handler::ActionHandler;
use crate::types::{ActionContext, HandlerOutcome};

const FIELDS: &[&str] = &[
    "title",
    "target_date",
    "status",
    "completion_status",
    "reflections",
];

pub struct UpdateGoalHandler {
    fallback_target_days: i64,
}

impl UpdateGoalHandler {
    pub fn new(fallback_target_days: i64) -> Self {
        Self {
            fallback_target_days,
        }
    }
}

impl ActionHandler for UpdateGoalHandler {
    fn action_names(&self) -> &'static [&'static str] {
        &["update_goal"]
    }

    fn execute(
        &self,
        conn: &Connection,
        data: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<HandlerOutcome, ActionError> {
        let goal_id = fields::resolve_goal_id(data, ctx)?;
        let mut goal = fields::owned_goal(conn, goal_id, ctx.user_id)?;

        if !FIELDS.iter().any(|f| has_field(data, f)) {
            return Err(ActionError::Validation(format!(
                "update_goal requires at least one of {}",
                FIELDS.join(", ")
            )));
        }

        let mut applied = 0usize;
        let mut rejected = Vec::new();
        let mut changes = Vec::new();

        if let Some(value) = data.get("title").filter(|v| !v.is_null()) {
            match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(title) => {
                    if title != goal.title {
                        changes.push(format!(
                            "Title changed from '{}' to '{}'",
                            goal.title, title
                        ));
                    }
                    goal.title = title.to_string();
                    applied += 1;
                }
                None => rejected.push(RejectedField::new("title", "title must not be blank")),
            }
        }

        if let Some(value) = data.get("target_date").filter(|v| !v.is_null()) {
            let resolved = dates::resolve_or_fallback(value, Utc::now(), self.fallback_target_days);
            if resolved.fell_back() {
                warn!(goal_id = goal.id, target_date = %value, "Unparsable goal target date, using fallback");
            }
            if resolved.date != goal.target_date {
                changes.push(format!(
                    "Target date changed from {} to {}",
                    goal.target_date.format("%Y-%m-%d"),
                    resolved.date.format("%Y-%m-%d")
                ));
            }
            goal.target_date = resolved.date;
            applied += 1;
        }

        if let Some(value) = data.get("status").filter(|v| !v.is_null()) {
            match value.as_str().map(str::parse::<GoalStatus>) {
                Some(Ok(status)) => {
                    if status != goal.status {
                        changes.push(format!(
                            "Status changed from {} to {}",
                            goal.status, status
                        ));
                    }
                    goal.status = status;
                    applied += 1;
                }
                Some(Err(reason)) => rejected.push(RejectedField::new("status", reason)),
                None => rejected.push(RejectedField::new("status", "status must be a string")),
            }
        }

        if let Some(value) = data.get("completion_status").filter(|v| !v.is_null()) {
            match number_value(value)
                .ok_or_else(|| "completion_status must be a number".to_string())
                .and_then(check_percent)
            {
                Ok(completion) => {
                    if completion != goal.completion_status {
                        changes.push(format!(
                            "Completion changed from {}% to {}%",
                            format_percent(goal.completion_status),
                            format_percent(completion)
                        ));
                    }
                    let before = goal.status;
                    goal.completion_status = completion;
                    goal.status = goal.status.after_completion(completion);
                    if goal.status != before {
                        changes.push(format!("Status changed from {} to {}", before, goal.status));
                    }
                    applied += 1;
                }
                Err(reason) => rejected.push(RejectedField::new("completion_status", reason)),
            }
        }

        if let Some(value) = data.get("reflections").filter(|v| !v.is_null()) {
            let pairs = fields::reflection_pairs(value);
            if pairs.is_empty() {
                rejected.push(RejectedField::new(
                    "reflections",
                    "no reflection had both a type and content",
                ));
            } else {
                for (kind, content) in &pairs {
                    let upsert = repository::upsert_reflection(conn, goal.id, kind, content)?;
                    let verb = if upsert.created { "added" } else { "updated" };
                    changes.push(format!("Reflection '{}' {}", kind, verb));
                }
                applied += 1;
            }
        }

        if applied == 0 {
            return Err(ActionError::Validation(format!(
                "no goal fields applied: {}",
                describe_rejections(&rejected)
            )));
        }

        let goal = repository::save_goal(conn, &goal)?;
        info!(
            user_id = ctx.user_id,
            goal_id = goal.id,
            applied,
            rejected = rejected.len(),
            changes = changes.len(),
            "Goal updated"
        );

        let acknowledgment = if changes.is_empty() {
            format!("Your goal \"{}\" is already up to date.", goal.title)
        } else {
            format!("I've updated your goal \"{}\": {}.", goal.title, changes.join("; "))
        };
        let detail = repository::goal_detail(conn, goal)?;

        Ok(HandlerOutcome::for_goal(detail.goal.id)
            .field("goal", serde_json::to_value(&detail)?)
            .field("rejected_fields", serde_json::to_value(&rejected)?)
            .field("changes", json!(changes))
            .acknowledge(acknowledgment)
            .with_changes(changes))
    }

    fn describe(&self, data: &Map<String, Value>) -> String {
        let supplied: Vec<&str> = FIELDS
            .iter()
            .copied()
            .filter(|f| has_field(data, f))
            .collect();
        match str_field(data, "title") {
            Some(title) => format!("Update goal '{}': {}", title, supplied.join(", ")),
            None => format!("Update goal: {}", supplied.join(", ")),
        }
    }
}
