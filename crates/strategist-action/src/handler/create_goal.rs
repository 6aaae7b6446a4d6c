//! `create_goal` handler.
//!
//! Creates a goal, then its milestones and reflections, all in the
//! caller's transaction. Malformed milestones are skipped one by one
//! instead of failing the whole goal.

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use strategist_core::types::{GoalDetail, NewGoal, Timestamp};
use strategist_storage::repository;
use strategist_storage::Connection;

use crate::dates;
use crate::error::ActionError;
use crate::fields::{self, id_field, plural, str_field};
use crate::handler::ActionHandler;
use crate::types::{ActionContext, HandlerOutcome};

pub struct CreateGoalHandler {
    fallback_target_days: i64,
}

impl CreateGoalHandler {
    pub fn new(fallback_target_days: i64) -> Self {
        Self {
            fallback_target_days,
        }
    }
}

impl ActionHandler for CreateGoalHandler {
    fn action_names(&self) -> &'static [&'static str] {
        &["create_goal"]
    }

    fn execute(
        &self,
        conn: &Connection,
        data: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<HandlerOutcome, ActionError> {
        let title = str_field(data, "title")
            .ok_or_else(|| ActionError::validation("create_goal requires a non-blank title"))?;
        let raw_target = data
            .get("target_date")
            .filter(|v| !v.is_null())
            .ok_or_else(|| ActionError::validation("create_goal requires a target_date"))?;

        let now = Utc::now();
        let target = dates::resolve_or_fallback(raw_target, now, self.fallback_target_days);
        if target.fell_back() {
            warn!(
                target_date = %raw_target,
                fallback_days = self.fallback_target_days,
                "Unparsable goal target date, using fallback"
            );
        }
        let start_date = data
            .get("start_date")
            .and_then(|v| dates::parse_value(v, now))
            .map_or(now, |d| d.date);

        let parent_goal_id = match id_field(data, "parent_goal_id") {
            Some(parent_id) => Some(fields::owned_goal(conn, parent_id, ctx.user_id)?.id),
            None => None,
        };

        let goal = repository::insert_goal(
            conn,
            &NewGoal {
                user_id: ctx.user_id,
                title: title.to_string(),
                start_date,
                target_date: target.date,
                parent_goal_id,
            },
        )?;

        let mut milestones = Vec::new();
        let mut skipped_milestones = 0usize;
        if let Some(Value::Array(items)) = data.get("milestones") {
            for item in items {
                match milestone_entry(item, now) {
                    Some((milestone_title, target_date)) => milestones.push(
                        repository::insert_milestone(conn, goal.id, milestone_title, target_date)?,
                    ),
                    None => {
                        skipped_milestones += 1;
                        debug!(goal_id = goal.id, milestone = %item, "Skipping malformed milestone");
                    }
                }
            }
        }

        let mut reflections = Vec::new();
        if let Some(value) = data.get("reflections") {
            for (kind, content) in fields::reflection_pairs(value) {
                reflections.push(repository::upsert_reflection(conn, goal.id, &kind, &content)?.reflection);
            }
        }

        info!(
            user_id = ctx.user_id,
            goal_id = goal.id,
            milestones = milestones.len(),
            reflections = reflections.len(),
            skipped_milestones,
            "Goal created"
        );

        let acknowledgment = if milestones.is_empty() {
            format!("I've created your goal \"{}\".", goal.title)
        } else {
            format!(
                "I've created your goal \"{}\" with {}.",
                goal.title,
                plural(milestones.len(), "milestone")
            )
        };
        let goal_id = goal.id;
        let detail = GoalDetail {
            goal,
            milestones,
            reflections,
        };

        Ok(HandlerOutcome::for_goal(goal_id)
            .field("goal", serde_json::to_value(&detail)?)
            .field("skipped_milestones", json!(skipped_milestones))
            .field("target_date_fallback", json!(target.fell_back()))
            .acknowledge(acknowledgment))
    }

    fn describe(&self, data: &Map<String, Value>) -> String {
        format!(
            "Create goal: {}",
            str_field(data, "title").unwrap_or("<no title>")
        )
    }
}

/// Title and parsed date of a milestone entry. Milestones get no fallback.
fn milestone_entry(item: &Value, now: Timestamp) -> Option<(&str, Timestamp)> {
    let item = item.as_object()?;
    let title = str_field(item, "title")?;
    let date = dates::parse_value(item.get("target_date")?, now)?;
    Some((title, date.date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::testing::{run, seed_goal, setup};
    use chrono::{Datelike, Duration};

    fn handler() -> CreateGoalHandler {
        CreateGoalHandler::new(90)
    }

    #[test]
    fn test_create_goal_with_milestone() {
        let db = setup();
        let outcome = run(
            &db,
            &handler(),
            json!({
                "title": "Run 5k",
                "target_date": "2025-06-01",
                "milestones": [{"title": "Buy shoes", "target_date": "2025-02-01"}]
            }),
            &ActionContext::new(1),
        )
        .unwrap();

        let goal = &outcome.fields["goal"];
        assert_eq!(goal["title"], "Run 5k");
        assert_eq!(goal["status"], "active");
        assert_eq!(goal["completion_status"], 0.0);
        assert_eq!(goal["milestones"].as_array().unwrap().len(), 1);
        assert_eq!(goal["milestones"][0]["status"], "pending");
        assert_eq!(outcome.fields["skipped_milestones"], 0);
        assert_eq!(
            outcome.acknowledgment.as_deref(),
            Some("I've created your goal \"Run 5k\" with 1 milestone.")
        );

        let goals = db
            .with_conn(|conn| repository::list_goals(conn, 1))
            .unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].target_date.year(), 2025);
        assert_eq!(goals[0].target_date.month(), 6);
    }

    #[test]
    fn test_unparsable_target_date_falls_back() {
        let db = setup();
        let outcome = run(
            &db,
            &handler(),
            json!({"title": "Write a novel", "target_date": "when inspiration strikes"}),
            &ActionContext::new(1),
        )
        .unwrap();
        assert_eq!(outcome.fields["target_date_fallback"], true);

        let goal = &db
            .with_conn(|conn| repository::list_goals(conn, 1))
            .unwrap()[0];
        let days = (goal.target_date - Utc::now()).num_days();
        assert!((88..=90).contains(&days), "got {} days", days);
    }

    #[test]
    fn test_lenient_target_date() {
        let db = setup();
        let outcome = run(
            &db,
            &handler(),
            json!({"title": "Learn piano", "target_date": "in 3 weeks"}),
            &ActionContext::new(1),
        )
        .unwrap();
        assert_eq!(outcome.fields["target_date_fallback"], false);
    }

    #[test]
    fn test_missing_title_or_date_is_validation_error() {
        let db = setup();
        let err = run(
            &db,
            &handler(),
            json!({"title": "  ", "target_date": "2025-06-01"}),
            &ActionContext::new(1),
        )
        .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));

        let err = run(&db, &handler(), json!({"title": "Run"}), &ActionContext::new(1))
            .unwrap_err();
        assert!(err.to_string().contains("target_date"));
    }

    #[test]
    fn test_malformed_milestones_skipped_individually() {
        let db = setup();
        let outcome = run(
            &db,
            &handler(),
            json!({
                "title": "Run 5k",
                "target_date": "2025-06-01",
                "milestones": [
                    {"title": "Buy shoes", "target_date": "2025-02-01"},
                    {"title": "No date"},
                    {"target_date": "2025-03-01"},
                    {"title": "Bad date", "target_date": "whenever"},
                    "not an object"
                ]
            }),
            &ActionContext::new(1),
        )
        .unwrap();
        assert_eq!(outcome.fields["skipped_milestones"], 4);
        assert_eq!(outcome.fields["goal"]["milestones"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_out_of_range_dates_do_not_fail_the_action() {
        let db = setup();
        let outcome = run(
            &db,
            &handler(),
            json!({
                "title": "Run 5k",
                "target_date": "in 4000000000 days",
                "milestones": [
                    {"title": "Buy shoes", "target_date": "in 2 weeks"},
                    {"title": "Forever", "target_date": "in 4000000000 weeks"}
                ]
            }),
            &ActionContext::new(1),
        )
        .unwrap();
        assert_eq!(outcome.fields["target_date_fallback"], true);
        assert_eq!(outcome.fields["skipped_milestones"], 1);

        let milestones = outcome.fields["goal"]["milestones"].as_array().unwrap();
        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0]["title"], "Buy shoes");

        let goal = &db
            .with_conn(|conn| repository::list_goals(conn, 1))
            .unwrap()[0];
        let days = (goal.target_date - Utc::now()).num_days();
        assert!((88..=90).contains(&days), "got {} days", days);
    }

    #[test]
    fn test_reflections_map_and_list() {
        let db = setup();
        let outcome = run(
            &db,
            &handler(),
            json!({
                "title": "Run 5k",
                "target_date": "2025-06-01",
                "reflections": {"importance": "Health", "obstacles": ""}
            }),
            &ActionContext::new(1),
        )
        .unwrap();
        let reflections = outcome.fields["goal"]["reflections"].as_array().unwrap();
        assert_eq!(reflections.len(), 1);
        assert_eq!(reflections[0]["reflection_type"], "importance");

        let outcome = run(
            &db,
            &handler(),
            json!({
                "title": "Read more",
                "target_date": "2025-06-01",
                "reflections": [
                    {"type": "importance", "content": "Focus"},
                    {"type": "timeline", "content": "A book a month"}
                ]
            }),
            &ActionContext::new(1),
        )
        .unwrap();
        assert_eq!(outcome.fields["goal"]["reflections"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parent_goal_must_be_owned() {
        let db = setup();
        let foreign = seed_goal(&db, 2, "Someone else's");
        let err = run(
            &db,
            &handler(),
            json!({"title": "Sub goal", "target_date": "2025-06-01", "parent_goal_id": foreign.id}),
            &ActionContext::new(1),
        )
        .unwrap_err();
        assert!(matches!(err, ActionError::Ownership { .. }));

        let own = seed_goal(&db, 1, "Mine");
        let outcome = run(
            &db,
            &handler(),
            json!({"title": "Sub goal", "target_date": "2025-06-01", "parent_goal_id": own.id}),
            &ActionContext::new(1),
        )
        .unwrap();
        assert_eq!(outcome.fields["goal"]["parent_goal_id"], own.id);
    }

    #[test]
    fn test_start_date_parsed_when_given() {
        let db = setup();
        let outcome = run(
            &db,
            &handler(),
            json!({"title": "Run", "target_date": "2030-06-01", "start_date": "tomorrow"}),
            &ActionContext::new(1),
        )
        .unwrap();
        let goal_id = outcome.goal_id.unwrap();
        let goal = db
            .with_conn(|conn| repository::get_goal(conn, goal_id))
            .unwrap()
            .unwrap();
        assert!(goal.start_date > Utc::now());
        assert!(goal.start_date < Utc::now() + Duration::days(2));
    }

    #[test]
    fn test_describe() {
        let d = crate::handler::testing::data(json!({"title": "Run 5k"}));
        assert_eq!(handler().describe(&d), "Create goal: Run 5k");
    }
}
