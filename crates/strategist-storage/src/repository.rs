//! Row-level persistence for goals, milestones, reflections, and progress.
//!
//! The free functions take a `&Connection` so handlers can call them inside
//! one transaction (`Transaction` derefs to `Connection`). `GoalRepository`
//! is the read-side facade that takes the database lock itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use strategist_core::error::StrategistError;
use strategist_core::types::{
    Goal, GoalDetail, GoalId, GoalStatus, Milestone, MilestoneId, MilestoneStatus,
    NewGoal, NewProgressUpdate, ProgressType, ProgressUpdate, Reflection, Timestamp, UserId,
};

use crate::db::Database;

const GOAL_COLUMNS: &str = "id, user_id, title, start_date, target_date, completion_status,
                            status, parent_goal_id, created_at, updated_at";
const MILESTONE_COLUMNS: &str =
    "id, goal_id, title, target_date, completion_status, status, created_at, updated_at";
const REFLECTION_COLUMNS: &str =
    "id, goal_id, reflection_type, content, created_at, updated_at";
const PROGRESS_COLUMNS: &str =
    "id, goal_id, milestone_id, progress_value, type, notes, created_at";

/// Result of looking up a goal on behalf of a user.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalLookup {
    Owned(Goal),
    /// The goal exists but belongs to someone else.
    Foreign { owner: UserId },
    Missing,
}

/// A reflection after an upsert, plus whether the row was new.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionUpsert {
    pub reflection: Reflection,
    pub created: bool,
}

// =============================================================================
// Goals
// =============================================================================

pub fn insert_goal(conn: &Connection, new: &NewGoal) -> Result<Goal, StrategistError> {
    let now = Utc::now().timestamp();
    conn.execute(
        "INSERT INTO goals (user_id, title, start_date, target_date, parent_goal_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            new.user_id,
            new.title,
            new.start_date.timestamp(),
            new.target_date.timestamp(),
            new.parent_goal_id,
            now,
        ],
    )
    .map_err(|e| StrategistError::Storage(format!("Failed to insert goal: {}", e)))?;

    let id = conn.last_insert_rowid();
    get_goal(conn, id)?
        .ok_or_else(|| StrategistError::Storage(format!("Goal {} vanished after insert", id)))
}

pub fn get_goal(conn: &Connection, id: GoalId) -> Result<Option<Goal>, StrategistError> {
    let sql = format!("SELECT {} FROM goals WHERE id = ?1", GOAL_COLUMNS);
    let result = conn
        .query_row(&sql, params![id], |row| Ok(row_to_goal(row)))
        .optional()
        .map_err(|e| StrategistError::Storage(e.to_string()))?;
    result.transpose()
}

/// Look a goal up and classify it by ownership.
pub fn lookup_goal(
    conn: &Connection,
    id: GoalId,
    user_id: UserId,
) -> Result<GoalLookup, StrategistError> {
    Ok(match get_goal(conn, id)? {
        Some(goal) if goal.user_id == user_id => GoalLookup::Owned(goal),
        Some(goal) => GoalLookup::Foreign { owner: goal.user_id },
        None => GoalLookup::Missing,
    })
}

/// Persist the mutable fields of a goal and bump `updated_at`.
pub fn save_goal(conn: &Connection, goal: &Goal) -> Result<Goal, StrategistError> {
    let changed = conn
        .execute(
            "UPDATE goals
             SET title = ?2, target_date = ?3, completion_status = ?4, status = ?5,
                 parent_goal_id = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                goal.id,
                goal.title,
                goal.target_date.timestamp(),
                goal.completion_status,
                goal.status.to_string(),
                goal.parent_goal_id,
                Utc::now().timestamp(),
            ],
        )
        .map_err(|e| StrategistError::Storage(format!("Failed to update goal: {}", e)))?;
    if changed == 0 {
        return Err(StrategistError::Storage(format!("Goal {} not found", goal.id)));
    }
    get_goal(conn, goal.id)?
        .ok_or_else(|| StrategistError::Storage(format!("Goal {} vanished after update", goal.id)))
}

pub fn list_goals(conn: &Connection, user_id: UserId) -> Result<Vec<Goal>, StrategistError> {
    let sql = format!(
        "SELECT {} FROM goals WHERE user_id = ?1 ORDER BY target_date ASC, id ASC",
        GOAL_COLUMNS
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StrategistError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(params![user_id], |row| Ok(row_to_goal(row)))
        .map_err(|e| StrategistError::Storage(e.to_string()))?;

    let mut goals = Vec::new();
    for row in rows {
        goals.push(row.map_err(|e| StrategistError::Storage(e.to_string()))??);
    }
    Ok(goals)
}

/// Delete a goal; milestones, reflections, and progress rows cascade.
pub fn delete_goal(conn: &Connection, id: GoalId) -> Result<bool, StrategistError> {
    let deleted = conn
        .execute("DELETE FROM goals WHERE id = ?1", params![id])
        .map_err(|e| StrategistError::Storage(format!("Failed to delete goal: {}", e)))?;
    Ok(deleted > 0)
}

pub fn goal_detail(conn: &Connection, goal: Goal) -> Result<GoalDetail, StrategistError> {
    let milestones = list_milestones(conn, goal.id)?;
    let reflections = list_reflections(conn, goal.id)?;
    Ok(GoalDetail {
        goal,
        milestones,
        reflections,
    })
}

// =============================================================================
// Milestones
// =============================================================================

pub fn insert_milestone(
    conn: &Connection,
    goal_id: GoalId,
    title: &str,
    target_date: Timestamp,
) -> Result<Milestone, StrategistError> {
    let now = Utc::now().timestamp();
    conn.execute(
        "INSERT INTO milestones (goal_id, title, target_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![goal_id, title, target_date.timestamp(), now],
    )
    .map_err(|e| StrategistError::Storage(format!("Failed to insert milestone: {}", e)))?;

    let id = conn.last_insert_rowid();
    get_milestone(conn, id)?
        .ok_or_else(|| StrategistError::Storage(format!("Milestone {} vanished after insert", id)))
}

pub fn get_milestone(
    conn: &Connection,
    id: MilestoneId,
) -> Result<Option<Milestone>, StrategistError> {
    let sql = format!("SELECT {} FROM milestones WHERE id = ?1", MILESTONE_COLUMNS);
    let result = conn
        .query_row(&sql, params![id], |row| Ok(row_to_milestone(row)))
        .optional()
        .map_err(|e| StrategistError::Storage(e.to_string()))?;
    result.transpose()
}

pub fn save_milestone(
    conn: &Connection,
    milestone: &Milestone,
) -> Result<Milestone, StrategistError> {
    let changed = conn
        .execute(
            "UPDATE milestones
             SET title = ?2, target_date = ?3, completion_status = ?4, status = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                milestone.id,
                milestone.title,
                milestone.target_date.timestamp(),
                milestone.completion_status,
                milestone.status.to_string(),
                Utc::now().timestamp(),
            ],
        )
        .map_err(|e| StrategistError::Storage(format!("Failed to update milestone: {}", e)))?;
    if changed == 0 {
        return Err(StrategistError::Storage(format!(
            "Milestone {} not found",
            milestone.id
        )));
    }
    get_milestone(conn, milestone.id)?.ok_or_else(|| {
        StrategistError::Storage(format!("Milestone {} vanished after update", milestone.id))
    })
}

pub fn list_milestones(
    conn: &Connection,
    goal_id: GoalId,
) -> Result<Vec<Milestone>, StrategistError> {
    let sql = format!(
        "SELECT {} FROM milestones WHERE goal_id = ?1 ORDER BY target_date ASC, id ASC",
        MILESTONE_COLUMNS
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StrategistError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(params![goal_id], |row| Ok(row_to_milestone(row)))
        .map_err(|e| StrategistError::Storage(e.to_string()))?;

    let mut milestones = Vec::new();
    for row in rows {
        milestones.push(row.map_err(|e| StrategistError::Storage(e.to_string()))??);
    }
    Ok(milestones)
}

// =============================================================================
// Reflections
// =============================================================================

/// Insert or update the reflection keyed by `(goal_id, reflection_type)`.
pub fn upsert_reflection(
    conn: &Connection,
    goal_id: GoalId,
    reflection_type: &str,
    content: &str,
) -> Result<ReflectionUpsert, StrategistError> {
    let now = Utc::now().timestamp();
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM reflections WHERE goal_id = ?1 AND reflection_type = ?2",
            params![goal_id, reflection_type],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StrategistError::Storage(e.to_string()))?;

    let (id, created) = match existing {
        Some(id) => {
            conn.execute(
                "UPDATE reflections SET content = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, content, now],
            )
            .map_err(|e| StrategistError::Storage(format!("Failed to update reflection: {}", e)))?;
            (id, false)
        }
        None => {
            conn.execute(
                "INSERT INTO reflections (goal_id, reflection_type, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![goal_id, reflection_type, content, now],
            )
            .map_err(|e| StrategistError::Storage(format!("Failed to insert reflection: {}", e)))?;
            (conn.last_insert_rowid(), true)
        }
    };

    let sql = format!("SELECT {} FROM reflections WHERE id = ?1", REFLECTION_COLUMNS);
    let reflection = conn
        .query_row(&sql, params![id], |row| Ok(row_to_reflection(row)))
        .map_err(|e| StrategistError::Storage(e.to_string()))??;
    Ok(ReflectionUpsert {
        reflection,
        created,
    })
}

pub fn list_reflections(
    conn: &Connection,
    goal_id: GoalId,
) -> Result<Vec<Reflection>, StrategistError> {
    let sql = format!(
        "SELECT {} FROM reflections WHERE goal_id = ?1 ORDER BY reflection_type ASC",
        REFLECTION_COLUMNS
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StrategistError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(params![goal_id], |row| Ok(row_to_reflection(row)))
        .map_err(|e| StrategistError::Storage(e.to_string()))?;

    let mut reflections = Vec::new();
    for row in rows {
        reflections.push(row.map_err(|e| StrategistError::Storage(e.to_string()))??);
    }
    Ok(reflections)
}

// =============================================================================
// Progress updates
// =============================================================================

pub fn insert_progress_update(
    conn: &Connection,
    new: &NewProgressUpdate,
) -> Result<ProgressUpdate, StrategistError> {
    conn.execute(
        "INSERT INTO progress_updates (goal_id, milestone_id, progress_value, type, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.goal_id,
            new.milestone_id,
            new.progress_value,
            new.progress_type.to_string(),
            new.notes,
            Utc::now().timestamp(),
        ],
    )
    .map_err(|e| StrategistError::Storage(format!("Failed to insert progress update: {}", e)))?;

    let id = conn.last_insert_rowid();
    get_progress_update(conn, id)?.ok_or_else(|| {
        StrategistError::Storage(format!("Progress update {} vanished after insert", id))
    })
}

pub fn get_progress_update(
    conn: &Connection,
    id: i64,
) -> Result<Option<ProgressUpdate>, StrategistError> {
    let sql = format!("SELECT {} FROM progress_updates WHERE id = ?1", PROGRESS_COLUMNS);
    let result = conn
        .query_row(&sql, params![id], |row| Ok(row_to_progress(row)))
        .optional()
        .map_err(|e| StrategistError::Storage(e.to_string()))?;
    result.transpose()
}

pub fn delete_progress_update(conn: &Connection, id: i64) -> Result<bool, StrategistError> {
    let deleted = conn
        .execute("DELETE FROM progress_updates WHERE id = ?1", params![id])
        .map_err(|e| StrategistError::Storage(format!("Failed to delete progress update: {}", e)))?;
    Ok(deleted > 0)
}

/// Progress log for a goal, newest first.
pub fn list_progress_updates(
    conn: &Connection,
    goal_id: GoalId,
    limit: u32,
) -> Result<Vec<ProgressUpdate>, StrategistError> {
    let sql = format!(
        "SELECT {} FROM progress_updates WHERE goal_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2",
        PROGRESS_COLUMNS
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StrategistError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(params![goal_id, limit], |row| Ok(row_to_progress(row)))
        .map_err(|e| StrategistError::Storage(e.to_string()))?;

    let mut updates = Vec::new();
    for row in rows {
        updates.push(row.map_err(|e| StrategistError::Storage(e.to_string()))??);
    }
    Ok(updates)
}

/// Latest progress-type entry for a goal (`milestone_id = None`) or for one
/// of its milestones.
pub fn latest_progress(
    conn: &Connection,
    goal_id: GoalId,
    milestone_id: Option<MilestoneId>,
) -> Result<Option<ProgressUpdate>, StrategistError> {
    let sql = format!(
        "SELECT {} FROM progress_updates
         WHERE goal_id = ?1 AND milestone_id IS ?2 AND type = 'progress'
         ORDER BY created_at DESC, id DESC LIMIT 1",
        PROGRESS_COLUMNS
    );
    let result = conn
        .query_row(&sql, params![goal_id, milestone_id], |row| {
            Ok(row_to_progress(row))
        })
        .optional()
        .map_err(|e| StrategistError::Storage(e.to_string()))?;
    result.transpose()
}

// =============================================================================
// GoalRepository
// =============================================================================

/// Read-side repository scoped by user ownership.
pub struct GoalRepository {
    db: Arc<Database>,
}

impl GoalRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All goals of a user, soonest target date first.
    pub fn list_for_user(&self, user_id: UserId) -> Result<Vec<Goal>, StrategistError> {
        self.db.with_conn(|conn| list_goals(conn, user_id))
    }

    /// One goal with its milestones and reflections, if the user owns it.
    pub fn detail(
        &self,
        goal_id: GoalId,
        user_id: UserId,
    ) -> Result<Option<GoalDetail>, StrategistError> {
        self.db.with_conn(|conn| match lookup_goal(conn, goal_id, user_id)? {
            GoalLookup::Owned(goal) => Ok(Some(goal_detail(conn, goal)?)),
            GoalLookup::Foreign { .. } | GoalLookup::Missing => Ok(None),
        })
    }

    /// Progress log of an owned goal, newest first.
    pub fn progress_history(
        &self,
        goal_id: GoalId,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ProgressUpdate>, StrategistError> {
        self.db.with_conn(|conn| match lookup_goal(conn, goal_id, user_id)? {
            GoalLookup::Owned(_) => list_progress_updates(conn, goal_id, limit),
            GoalLookup::Foreign { .. } | GoalLookup::Missing => Ok(Vec::new()),
        })
    }

    /// Delete an owned goal. Returns `false` when nothing was deleted.
    pub fn delete(&self, goal_id: GoalId, user_id: UserId) -> Result<bool, StrategistError> {
        self.db.with_transaction(|tx| match lookup_goal(tx, goal_id, user_id)? {
            GoalLookup::Owned(_) => delete_goal(tx, goal_id),
            GoalLookup::Foreign { .. } | GoalLookup::Missing => Ok(false),
        })
    }

    /// Delete one entry from an owned goal's progress log.
    ///
    /// Deleting a `progress` entry recomputes `completion_status` of the goal
    /// (or of its milestone, for milestone entries) from the newest remaining
    /// entry of the same scope, or 0 when none is left. A completed goal or
    /// milestone that drops below 100 this way is reopened.
    ///
    /// Returns the goal after the change, or `None` when the goal is not
    /// owned by `user_id` or the entry does not belong to it.
    pub fn delete_progress_update(
        &self,
        goal_id: GoalId,
        update_id: i64,
        user_id: UserId,
    ) -> Result<Option<Goal>, StrategistError> {
        self.db.with_transaction(|tx| {
            let mut goal = match lookup_goal(tx, goal_id, user_id)? {
                GoalLookup::Owned(goal) => goal,
                GoalLookup::Foreign { .. } | GoalLookup::Missing => return Ok(None),
            };
            let update = match get_progress_update(tx, update_id)? {
                Some(update) if update.goal_id == goal_id => update,
                _ => return Ok(None),
            };
            delete_progress_update(tx, update_id)?;

            if update.progress_type == ProgressType::Progress {
                let completion = latest_progress(tx, goal_id, update.milestone_id)?
                    .map_or(0.0, |latest| latest.progress_value);
                match update.milestone_id {
                    Some(milestone_id) => {
                        if let Some(mut milestone) = get_milestone(tx, milestone_id)? {
                            milestone.completion_status = completion;
                            milestone.status = milestone.status.after_retraction(completion);
                            save_milestone(tx, &milestone)?;
                        }
                    }
                    None => {
                        goal.completion_status = completion;
                        goal.status = goal.status.after_retraction(completion);
                        goal = save_goal(tx, &goal)?;
                    }
                }
            }

            info!(
                goal_id,
                update_id,
                milestone_id = ?update.milestone_id,
                completion = goal.completion_status,
                "Progress update deleted"
            );
            Ok(Some(goal))
        })
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn ts(secs: i64) -> Timestamp {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn col<T: rusqlite::types::FromSql>(row: &Row<'_>, idx: usize) -> Result<T, StrategistError> {
    row.get(idx)
        .map_err(|e| StrategistError::Storage(e.to_string()))
}

fn row_to_goal(row: &Row<'_>) -> Result<Goal, StrategistError> {
    let status: String = col(row, 6)?;
    Ok(Goal {
        id: col(row, 0)?,
        user_id: col(row, 1)?,
        title: col(row, 2)?,
        start_date: ts(col(row, 3)?),
        target_date: ts(col(row, 4)?),
        completion_status: col(row, 5)?,
        status: status
            .parse::<GoalStatus>()
            .map_err(StrategistError::Storage)?,
        parent_goal_id: col(row, 7)?,
        created_at: ts(col(row, 8)?),
        updated_at: ts(col(row, 9)?),
    })
}

fn row_to_milestone(row: &Row<'_>) -> Result<Milestone, StrategistError> {
    let status: String = col(row, 5)?;
    Ok(Milestone {
        id: col(row, 0)?,
        goal_id: col(row, 1)?,
        title: col(row, 2)?,
        target_date: ts(col(row, 3)?),
        completion_status: col(row, 4)?,
        status: status
            .parse::<MilestoneStatus>()
            .map_err(StrategistError::Storage)?,
        created_at: ts(col(row, 6)?),
        updated_at: ts(col(row, 7)?),
    })
}

fn row_to_reflection(row: &Row<'_>) -> Result<Reflection, StrategistError> {
    Ok(Reflection {
        id: col(row, 0)?,
        goal_id: col(row, 1)?,
        reflection_type: col(row, 2)?,
        content: col(row, 3)?,
        created_at: ts(col(row, 4)?),
        updated_at: ts(col(row, 5)?),
    })
}

pub(crate) fn row_to_progress(row: &Row<'_>) -> Result<ProgressUpdate, StrategistError> {
    let progress_type: String = col(row, 4)?;
    Ok(ProgressUpdate {
        id: col(row, 0)?,
        goal_id: col(row, 1)?,
        milestone_id: col(row, 2)?,
        progress_value: col(row, 3)?,
        progress_type: progress_type
            .parse::<ProgressType>()
            .map_err(StrategistError::Storage)?,
        notes: col(row, 5)?,
        created_at: ts(col(row, 6)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_db() -> Arc<Database> {
        Arc::new(Database::in_memory().unwrap())
    }

    fn new_goal(user_id: UserId, title: &str) -> NewGoal {
        let now = Utc::now();
        NewGoal {
            user_id,
            title: title.to_string(),
            start_date: now,
            target_date: now + Duration::days(30),
            parent_goal_id: None,
        }
    }

    #[test]
    fn test_insert_and_get_goal() {
        let db = make_db();
        let goal = db
            .with_conn(|conn| insert_goal(conn, &new_goal(1, "Run 5k")))
            .unwrap();
        assert_eq!(goal.title, "Run 5k");
        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(goal.completion_status, 0.0);

        let fetched = db.with_conn(|conn| get_goal(conn, goal.id)).unwrap();
        assert_eq!(fetched, Some(goal));
    }

    #[test]
    fn test_lookup_goal_classifies_ownership() {
        let db = make_db();
        let goal = db
            .with_conn(|conn| insert_goal(conn, &new_goal(1, "Mine")))
            .unwrap();

        db.with_conn(|conn| {
            assert!(matches!(lookup_goal(conn, goal.id, 1)?, GoalLookup::Owned(_)));
            assert_eq!(
                lookup_goal(conn, goal.id, 2)?,
                GoalLookup::Foreign { owner: 1 }
            );
            assert_eq!(lookup_goal(conn, 9999, 1)?, GoalLookup::Missing);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_save_goal_persists_fields() {
        let db = make_db();
        let mut goal = db
            .with_conn(|conn| insert_goal(conn, &new_goal(1, "Old")))
            .unwrap();
        goal.title = "New".to_string();
        goal.completion_status = 55.0;
        goal.status = GoalStatus::Deferred;

        let saved = db.with_conn(|conn| save_goal(conn, &goal)).unwrap();
        assert_eq!(saved.title, "New");
        assert_eq!(saved.completion_status, 55.0);
        assert_eq!(saved.status, GoalStatus::Deferred);
    }

    #[test]
    fn test_milestone_crud() {
        let db = make_db();
        db.with_conn(|conn| {
            let goal = insert_goal(conn, &new_goal(1, "Run 5k"))?;
            let mut milestone = insert_milestone(conn, goal.id, "Buy shoes", goal.target_date)?;
            assert_eq!(milestone.status, MilestoneStatus::Pending);

            milestone.status = MilestoneStatus::InProgress;
            milestone.completion_status = 30.0;
            let saved = save_milestone(conn, &milestone)?;
            assert_eq!(saved.status, MilestoneStatus::InProgress);

            let all = list_milestones(conn, goal.id)?;
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].title, "Buy shoes");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_upsert_reflection_updates_in_place() {
        let db = make_db();
        db.with_conn(|conn| {
            let goal = insert_goal(conn, &new_goal(1, "Run 5k"))?;
            let first = upsert_reflection(conn, goal.id, "importance", "health")?;
            assert!(first.created);

            let second = upsert_reflection(conn, goal.id, "importance", "energy")?;
            assert!(!second.created);
            assert_eq!(second.reflection.id, first.reflection.id);
            assert_eq!(second.reflection.content, "energy");

            let all = list_reflections(conn, goal.id)?;
            assert_eq!(all.len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_progress_log_and_latest() {
        let db = make_db();
        db.with_conn(|conn| {
            let goal = insert_goal(conn, &new_goal(1, "Run 5k"))?;
            for (value, kind) in [
                (40.0, ProgressType::Progress),
                (7.0, ProgressType::Effort),
                (90.0, ProgressType::Progress),
            ] {
                insert_progress_update(
                    conn,
                    &NewProgressUpdate {
                        goal_id: goal.id,
                        milestone_id: None,
                        progress_value: value,
                        progress_type: kind,
                        notes: None,
                    },
                )?;
            }

            let history = list_progress_updates(conn, goal.id, 10)?;
            assert_eq!(history.len(), 3);
            assert_eq!(history[0].progress_value, 90.0);

            let latest = latest_progress(conn, goal.id, None)?.unwrap();
            assert_eq!(latest.progress_value, 90.0);
            assert_eq!(latest.progress_type, ProgressType::Progress);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_repository_hides_foreign_goals() {
        let db = make_db();
        let goal = db
            .with_conn(|conn| insert_goal(conn, &new_goal(1, "Private")))
            .unwrap();
        let repo = GoalRepository::new(Arc::clone(&db));

        assert!(repo.detail(goal.id, 1).unwrap().is_some());
        assert!(repo.detail(goal.id, 2).unwrap().is_none());
        assert!(repo.list_for_user(2).unwrap().is_empty());
        assert!(!repo.delete(goal.id, 2).unwrap());
        assert!(repo.delete(goal.id, 1).unwrap());
        assert!(repo.list_for_user(1).unwrap().is_empty());
    }

    fn log_progress(
        conn: &Connection,
        goal_id: GoalId,
        milestone_id: Option<MilestoneId>,
        value: f64,
        progress_type: ProgressType,
    ) -> ProgressUpdate {
        insert_progress_update(
            conn,
            &NewProgressUpdate {
                goal_id,
                milestone_id,
                progress_value: value,
                progress_type,
                notes: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_delete_progress_update_recomputes_goal() {
        let db = make_db();
        let (goal, first, last) = db
            .with_conn(|conn| {
                let mut goal = insert_goal(conn, &new_goal(1, "Run 5k"))?;
                let first = log_progress(conn, goal.id, None, 40.0, ProgressType::Progress);
                let last = log_progress(conn, goal.id, None, 100.0, ProgressType::Progress);
                goal.completion_status = 100.0;
                goal.status = GoalStatus::Completed;
                Ok((save_goal(conn, &goal)?, first, last))
            })
            .unwrap();
        let repo = GoalRepository::new(Arc::clone(&db));

        let updated = repo.delete_progress_update(goal.id, last.id, 1).unwrap().unwrap();
        assert_eq!(updated.completion_status, 40.0);
        assert_eq!(updated.status, GoalStatus::Active);

        let updated = repo.delete_progress_update(goal.id, first.id, 1).unwrap().unwrap();
        assert_eq!(updated.completion_status, 0.0);
        assert!(repo.progress_history(goal.id, 1, 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_progress_update_scoped_to_owner_and_goal() {
        let db = make_db();
        let (goal, other, entry) = db
            .with_conn(|conn| {
                let goal = insert_goal(conn, &new_goal(1, "Mine"))?;
                let other = insert_goal(conn, &new_goal(1, "Also mine"))?;
                let entry = log_progress(conn, goal.id, None, 30.0, ProgressType::Progress);
                Ok((goal, other, entry))
            })
            .unwrap();
        let repo = GoalRepository::new(Arc::clone(&db));

        assert!(repo.delete_progress_update(goal.id, entry.id, 2).unwrap().is_none());
        assert!(repo.delete_progress_update(other.id, entry.id, 1).unwrap().is_none());
        assert!(repo.delete_progress_update(goal.id, 9999, 1).unwrap().is_none());
        assert_eq!(repo.progress_history(goal.id, 1, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_milestone_progress_reopens_milestone_only() {
        let db = make_db();
        let (mut goal, milestone, last) = db
            .with_conn(|conn| {
                let mut goal = insert_goal(conn, &new_goal(1, "Run 5k"))?;
                goal.completion_status = 60.0;
                let goal = save_goal(conn, &goal)?;
                let mut milestone =
                    insert_milestone(conn, goal.id, "Buy shoes", goal.target_date)?;
                log_progress(conn, goal.id, Some(milestone.id), 50.0, ProgressType::Progress);
                let last =
                    log_progress(conn, goal.id, Some(milestone.id), 100.0, ProgressType::Progress);
                milestone.completion_status = 100.0;
                milestone.status = MilestoneStatus::Completed;
                let milestone = save_milestone(conn, &milestone)?;
                Ok((goal, milestone, last))
            })
            .unwrap();
        let repo = GoalRepository::new(Arc::clone(&db));

        goal = repo.delete_progress_update(goal.id, last.id, 1).unwrap().unwrap();
        assert_eq!(goal.completion_status, 60.0);

        let reloaded = db
            .with_conn(|conn| get_milestone(conn, milestone.id))
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.completion_status, 50.0);
        assert_eq!(reloaded.status, MilestoneStatus::InProgress);
    }

    #[test]
    fn test_delete_effort_entry_keeps_completion() {
        let db = make_db();
        let (goal, effort) = db
            .with_conn(|conn| {
                let mut goal = insert_goal(conn, &new_goal(1, "Run 5k"))?;
                log_progress(conn, goal.id, None, 70.0, ProgressType::Progress);
                let effort = log_progress(conn, goal.id, None, 3.0, ProgressType::Effort);
                goal.completion_status = 70.0;
                Ok((save_goal(conn, &goal)?, effort))
            })
            .unwrap();
        let repo = GoalRepository::new(Arc::clone(&db));

        let updated = repo.delete_progress_update(goal.id, effort.id, 1).unwrap().unwrap();
        assert_eq!(updated.completion_status, 70.0);
        assert_eq!(repo.progress_history(goal.id, 1, 10).unwrap().len(), 1);
    }
}
