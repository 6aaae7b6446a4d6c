//! Aggregate queries over a user's goals.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::Serialize;

use strategist_core::error::StrategistError;
use strategist_core::types::{GoalId, ProgressUpdate, Timestamp, UserId};

use crate::db::Database;
use crate::repository::row_to_progress;

/// Entries listed in [`ProgressSummary::recently_updated`].
const RECENT_UPDATES: u32 = 5;

/// A goal whose target date falls inside the look-ahead window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueGoal {
    pub id: GoalId,
    pub title: String,
    pub target_date: Timestamp,
    pub completion_status: f64,
    pub days_remaining: i64,
}

/// Progress overview for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total_goals: u64,
    pub active_goals: u64,
    pub completed_goals: u64,
    pub abandoned_goals: u64,
    pub deferred_goals: u64,
    /// Mean `completion_status` of active goals, 0 when there are none.
    pub avg_completion: f64,
    pub due_soon: Vec<DueGoal>,
    /// Newest progress-log entries across all of the user's goals.
    pub recently_updated: Vec<RecentUpdate>,
}

/// A progress-log entry with the title of its goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentUpdate {
    pub goal_title: String,
    #[serde(flatten)]
    pub update: ProgressUpdate,
}

pub struct SummaryService {
    db: Arc<Database>,
}

impl SummaryService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Summarize a user's goals; `due_within_days` bounds the `due_soon` list.
    pub fn summary(
        &self,
        user_id: UserId,
        due_within_days: i64,
    ) -> Result<ProgressSummary, StrategistError> {
        let now = Utc::now();
        let horizon = Duration::try_days(due_within_days.max(0))
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT status, COUNT(*), COALESCE(AVG(completion_status), 0.0)
                     FROM goals WHERE user_id = ?1
                     GROUP BY status",
                )
                .map_err(|e| StrategistError::Storage(format!("Summary prepare: {}", e)))?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                })
                .map_err(|e| StrategistError::Storage(format!("Summary query: {}", e)))?;

            let mut summary = ProgressSummary {
                total_goals: 0,
                active_goals: 0,
                completed_goals: 0,
                abandoned_goals: 0,
                deferred_goals: 0,
                avg_completion: 0.0,
                due_soon: Vec::new(),
                recently_updated: Vec::new(),
            };
            for row in rows {
                let (status, count, avg) =
                    row.map_err(|e| StrategistError::Storage(e.to_string()))?;
                let count = count as u64;
                summary.total_goals += count;
                match status.as_str() {
                    "active" => {
                        summary.active_goals = count;
                        summary.avg_completion = avg;
                    }
                    "completed" => summary.completed_goals = count,
                    "abandoned" => summary.abandoned_goals = count,
                    "deferred" => summary.deferred_goals = count,
                    _ => {}
                }
            }

            let mut stmt = conn
                .prepare(
                    "SELECT id, title, target_date, completion_status
                     FROM goals
                     WHERE user_id = ?1 AND status = 'active'
                       AND target_date >= ?2 AND target_date <= ?3
                     ORDER BY target_date ASC",
                )
                .map_err(|e| StrategistError::Storage(format!("Due-soon prepare: {}", e)))?;
            let rows = stmt
                .query_map(
                    params![user_id, now.timestamp(), horizon.timestamp()],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, f64>(3)?,
                        ))
                    },
                )
                .map_err(|e| StrategistError::Storage(format!("Due-soon query: {}", e)))?;

            for row in rows {
                let (id, title, target, completion_status) =
                    row.map_err(|e| StrategistError::Storage(e.to_string()))?;
                let target_date = DateTime::from_timestamp(target, 0).unwrap_or_default();
                summary.due_soon.push(DueGoal {
                    id,
                    title,
                    target_date,
                    completion_status,
                    days_remaining: (target_date - now).num_days(),
                });
            }

            let mut stmt = conn
                .prepare(
                    "SELECT p.id, p.goal_id, p.milestone_id, p.progress_value, p.type, p.notes,
                            p.created_at, g.title
                     FROM progress_updates p
                     JOIN goals g ON g.id = p.goal_id
                     WHERE g.user_id = ?1
                     ORDER BY p.created_at DESC, p.id DESC
                     LIMIT ?2",
                )
                .map_err(|e| StrategistError::Storage(format!("Recent-updates prepare: {}", e)))?;
            let rows = stmt
                .query_map(params![user_id, RECENT_UPDATES], |row| {
                    Ok(row_to_progress(row).and_then(|update| {
                        let goal_title = row
                            .get::<_, String>(7)
                            .map_err(|e| StrategistError::Storage(e.to_string()))?;
                        Ok(RecentUpdate { goal_title, update })
                    }))
                })
                .map_err(|e| StrategistError::Storage(format!("Recent-updates query: {}", e)))?;
            for row in rows {
                summary
                    .recently_updated
                    .push(row.map_err(|e| StrategistError::Storage(e.to_string()))??);
            }

            Ok(summary)
        })
    }
}
