//! `update_progress` handler.
//!
//! Appends a progress entry and, for progress-type entries, writes the
//! value to the milestone's or goal's `completion_status`.

use serde_json::{json, Map, Value};
use tracing::info;

use strategist_core::types::{check_percent, NewProgressUpdate, ProgressType};
use strategist_storage::repository;
use strategist_storage::Connection;

use crate::error::ActionError;
use crate::fields::{self, format_percent, id_field, number_field, str_field};
use crate::handler::ActionHandler;
use crate::types::{ActionContext, HandlerOutcome};

pub struct UpdateProgressHandler;

impl ActionHandler for UpdateProgressHandler {
    fn action_names(&self) -> &'static [&'static str] {
        &["update_progress"]
    }

    fn execute(
        &self,
        conn: &Connection,
        data: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<HandlerOutcome, ActionError> {
        let goal_id = fields::resolve_goal_id(data, ctx)?;
        let mut goal = fields::owned_goal(conn, goal_id, ctx.user_id)?;

        let value = progress_value(data)?;
        let progress_type = match str_field(data, "type") {
            Some(raw) => raw.parse::<ProgressType>().map_err(ActionError::Validation)?,
            None => ProgressType::Progress,
        };
        let mut milestone = match id_field(data, "milestone_id") {
            Some(milestone_id) => Some(fields::goal_milestone(conn, &goal, milestone_id)?),
            None => None,
        };

        let update = repository::insert_progress_update(
            conn,
            &NewProgressUpdate {
                goal_id: goal.id,
                milestone_id: milestone.as_ref().map(|m| m.id),
                progress_value: value,
                progress_type,
                notes: str_field(data, "notes").map(str::to_string),
            },
        )?;

        let mut completed = false;
        if progress_type == ProgressType::Progress {
            match milestone.as_mut() {
                Some(m) => {
                    let before = m.status;
                    m.completion_status = value;
                    m.status = m.status.after_completion(value);
                    completed = m.status != before;
                    *m = repository::save_milestone(conn, m)?;
                }
                None => {
                    let before = goal.status;
                    goal.completion_status = value;
                    goal.status = goal.status.after_completion(value);
                    completed = goal.status != before;
                    goal = repository::save_goal(conn, &goal)?;
                }
            }
        }

        info!(
            user_id = ctx.user_id,
            goal_id = goal.id,
            milestone_id = ?milestone.as_ref().map(|m| m.id),
            value,
            progress_type = %progress_type,
            completed,
            "Progress recorded"
        );

        let subject = milestone.as_ref().map_or(&goal.title, |m| &m.title);
        let acknowledgment = match progress_type {
            ProgressType::Progress if completed => format!(
                "Progress on \"{}\" is now {}%. Congratulations on completing it!",
                subject,
                format_percent(value)
            ),
            ProgressType::Progress => format!(
                "Progress on \"{}\" is now {}%.",
                subject,
                format_percent(value)
            ),
            ProgressType::Effort => format!(
                "I've logged an effort level of {} for \"{}\".",
                format_percent(value),
                subject
            ),
        };

        let mut outcome = HandlerOutcome::for_goal(goal.id)
            .field("progress_update", serde_json::to_value(&update)?)
            .field(
                "goal",
                json!({
                    "id": goal.id,
                    "completion_status": goal.completion_status,
                    "status": goal.status,
                }),
            )
            .acknowledge(acknowledgment);
        if let Some(m) = &milestone {
            outcome = outcome.field("milestone", serde_json::to_value(m)?);
        }
        Ok(outcome)
    }

    fn describe(&self, data: &Map<String, Value>) -> String {
        let value = progress_value(data)
            .map(format_percent)
            .unwrap_or_else(|_| "?".to_string());
        format!("Update progress to {}", value)
    }
}

/// `progress_value`, or its alias `value`, checked against `[0, 100]`.
fn progress_value(data: &Map<String, Value>) -> Result<f64, ActionError> {
    let raw = match number_field(data, "progress_value").map_err(ActionError::Validation)? {
        Some(v) => Some(v),
        None => number_field(data, "value").map_err(ActionError::Validation)?,
    };
    let value =
        raw.ok_or_else(|| ActionError::validation("update_progress requires a numeric progress_value"))?;
    check_percent(value).map_err(ActionError::Validation)
}
