//! `update_milestone` handler.
//!
//! Fields are applied independently: a field that fails validation is
//! reported in `rejected_fields` while the others still land. The action
//! fails only when nothing at all could be applied.

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;

use strategist_core::types::{check_percent, MilestoneStatus};
use strategist_storage::repository;
use strategist_storage::Connection;

use crate::dates;
use crate::error::ActionError;
use crate::fields::{
    self, describe_rejections, format_percent, has_field, id_field, number_value, RejectedField,
};
use crate::handler::ActionHandler;
use crate::types::{ActionContext, HandlerOutcome};

const FIELDS: &[&str] = &["status", "completion_status", "title", "target_date"];

pub struct UpdateMilestoneHandler;

impl ActionHandler for UpdateMilestoneHandler {
    fn action_names(&self) -> &'static [&'static str] {
        &["update_milestone"]
    }

    fn execute(
        &self,
        conn: &Connection,
        data: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<HandlerOutcome, ActionError> {
        let goal_id = fields::resolve_goal_id(data, ctx)?;
        let goal = fields::owned_goal(conn, goal_id, ctx.user_id)?;
        let milestone_id = id_field(data, "milestone_id")
            .ok_or_else(|| ActionError::validation("update_milestone requires a milestone_id"))?;
        let mut milestone = fields::goal_milestone(conn, &goal, milestone_id)?;
        let original_status = milestone.status;

        if !FIELDS.iter().any(|f| has_field(data, f)) {
            return Err(ActionError::Validation(format!(
                "update_milestone requires at least one of {}",
                FIELDS.join(", ")
            )));
        }

        let mut applied = 0usize;
        let mut rejected = Vec::new();
        let mut changes = Vec::new();

        if let Some(value) = data.get("status").filter(|v| !v.is_null()) {
            match value.as_str().map(str::parse::<MilestoneStatus>) {
                Some(Ok(status)) => {
                    if status != milestone.status {
                        changes.push(format!(
                            "Milestone '{}' status changed from {} to {}",
                            milestone.title, milestone.status, status
                        ));
                    }
                    milestone.status = status;
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
                    if completion != milestone.completion_status {
                        changes.push(format!(
                            "Milestone '{}' completion changed from {}% to {}%",
                            milestone.title,
                            format_percent(milestone.completion_status),
                            format_percent(completion)
                        ));
                    }
                    let before = milestone.status;
                    milestone.completion_status = completion;
                    milestone.status = milestone.status.after_completion(completion);
                    if milestone.status != before {
                        changes.push(format!("Milestone '{}' completed", milestone.title));
                    }
                    applied += 1;
                }
                Err(reason) => rejected.push(RejectedField::new("completion_status", reason)),
            }
        }

        if let Some(value) = data.get("title").filter(|v| !v.is_null()) {
            match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(title) => {
                    if title != milestone.title {
                        changes.push(format!(
                            "Milestone title changed from '{}' to '{}'",
                            milestone.title, title
                        ));
                    }
                    milestone.title = title.to_string();
                    applied += 1;
                }
                None => rejected.push(RejectedField::new("title", "title must not be blank")),
            }
        }

        if let Some(value) = data.get("target_date").filter(|v| !v.is_null()) {
            match dates::parse_value(value, Utc::now()) {
                Some(resolved) => {
                    if resolved.date != milestone.target_date {
                        changes.push(format!(
                            "Milestone '{}' target date changed from {} to {}",
                            milestone.title,
                            milestone.target_date.format("%Y-%m-%d"),
                            resolved.date.format("%Y-%m-%d")
                        ));
                    }
                    milestone.target_date = resolved.date;
                    applied += 1;
                }
                None => rejected.push(RejectedField::new(
                    "target_date",
                    format!("could not parse date {}", value),
                )),
            }
        }

        if applied == 0 {
            return Err(ActionError::Validation(format!(
                "no milestone fields applied: {}",
                describe_rejections(&rejected)
            )));
        }

        let milestone = repository::save_milestone(conn, &milestone)?;
        info!(
            user_id = ctx.user_id,
            goal_id = goal.id,
            milestone_id = milestone.id,
            applied,
            rejected = rejected.len(),
            "Milestone updated"
        );

        let acknowledgment = if milestone.status == MilestoneStatus::Completed
            && original_status != MilestoneStatus::Completed
        {
            format!("Nice work! Milestone \"{}\" is complete.", milestone.title)
        } else {
            format!("I've updated the milestone \"{}\".", milestone.title)
        };

        Ok(HandlerOutcome::for_goal(goal.id)
            .field("milestone", serde_json::to_value(&milestone)?)
            .field("rejected_fields", serde_json::to_value(&rejected)?)
            .field("changes", json!(changes))
            .acknowledge(acknowledgment)
            .with_changes(changes))
    }

    fn describe(&self, data: &Map<String, Value>) -> String {
        match id_field(data, "milestone_id") {
            Some(id) => format!("Update milestone {}", id),
            None => "Update milestone".to_string(),
        }
    }
}
