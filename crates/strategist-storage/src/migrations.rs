//! Database schema migrations.
//!
//! Version 1 creates the goals, milestones, reflections, and
//! progress_updates tables. Range, enum, and uniqueness invariants are
//! duplicated here as CHECK/UNIQUE constraints.

use rusqlite::Connection;
use tracing::info;

use strategist_core::error::StrategistError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), StrategistError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| StrategistError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            StrategistError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: goal_tracking_schema");
    }

    Ok(())
}

/// Version 1: goal tracking schema.
fn apply_v1(conn: &Connection) -> Result<(), StrategistError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS goals (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id             INTEGER NOT NULL,
            title               TEXT NOT NULL,
            start_date          INTEGER NOT NULL,
            target_date         INTEGER NOT NULL,
            completion_status   REAL NOT NULL DEFAULT 0
                                CHECK (completion_status BETWEEN 0 AND 100),
            status              TEXT NOT NULL DEFAULT 'active'
                                CHECK (status IN ('active', 'completed', 'abandoned', 'deferred')),
            parent_goal_id      INTEGER REFERENCES goals(id) ON DELETE SET NULL,
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_goals_user
            ON goals (user_id, status);

        CREATE TABLE IF NOT EXISTS milestones (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id             INTEGER NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
            title               TEXT NOT NULL,
            target_date         INTEGER NOT NULL,
            completion_status   REAL NOT NULL DEFAULT 0
                                CHECK (completion_status BETWEEN 0 AND 100),
            status              TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'in_progress', 'completed', 'missed')),
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_milestones_goal
            ON milestones (goal_id, target_date ASC);

        CREATE TABLE IF NOT EXISTS reflections (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id             INTEGER NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
            reflection_type     TEXT NOT NULL,
            content             TEXT NOT NULL,
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL,
            UNIQUE (goal_id, reflection_type)
        );

        CREATE TABLE IF NOT EXISTS progress_updates (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id             INTEGER NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
            milestone_id        INTEGER REFERENCES milestones(id) ON DELETE SET NULL,
            progress_value      REAL NOT NULL
                                CHECK (progress_value BETWEEN 0 AND 100),
            type                TEXT NOT NULL DEFAULT 'progress'
                                CHECK (type IN ('progress', 'effort')),
            notes               TEXT,
            created_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_progress_goal
            ON progress_updates (goal_id, created_at DESC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'goal_tracking_schema');
        ",
    )
    .map_err(|e| StrategistError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn insert_goal(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO goals (user_id, title, start_date, target_date, created_at, updated_at)
             VALUES (7, 'Run 5k', 0, 86400, 0, 0)",
            [],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_goal_completion_check() {
        let conn = open_test_conn();
        let goal_id = insert_goal(&conn);
        let result = conn.execute(
            "UPDATE goals SET completion_status = 101 WHERE id = ?1",
            [goal_id],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_goal_status_check() {
        let conn = open_test_conn();
        let goal_id = insert_goal(&conn);
        let result = conn.execute("UPDATE goals SET status = 'done' WHERE id = ?1", [goal_id]);
        assert!(result.is_err());
    }

    #[test]
    fn test_reflection_unique_per_goal() {
        let conn = open_test_conn();
        let goal_id = insert_goal(&conn);
        let insert = "INSERT INTO reflections (goal_id, reflection_type, content, created_at, updated_at)
                      VALUES (?1, 'importance', 'x', 0, 0)";
        conn.execute(insert, [goal_id]).unwrap();
        assert!(conn.execute(insert, [goal_id]).is_err());
    }

    #[test]
    fn test_milestone_requires_existing_goal() {
        let conn = open_test_conn();
        let result = conn.execute(
            "INSERT INTO milestones (goal_id, title, target_date, created_at, updated_at)
             VALUES (999, 'orphan', 0, 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_children_cascade_with_goal() {
        let conn = open_test_conn();
        let goal_id = insert_goal(&conn);
        conn.execute(
            "INSERT INTO milestones (goal_id, title, target_date, created_at, updated_at)
             VALUES (?1, 'Buy shoes', 0, 0, 0)",
            [goal_id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO progress_updates (goal_id, progress_value, created_at) VALUES (?1, 10, 0)",
            [goal_id],
        )
        .unwrap();

        conn.execute("DELETE FROM goals WHERE id = ?1", [goal_id]).unwrap();

        let milestones: i64 = conn
            .query_row("SELECT COUNT(*) FROM milestones", [], |row| row.get(0))
            .unwrap();
        let updates: i64 = conn
            .query_row("SELECT COUNT(*) FROM progress_updates", [], |row| row.get(0))
            .unwrap();
        assert_eq!(milestones, 0);
        assert_eq!(updates, 0);
    }
}
