use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// SQLite row id of a user (owned by the external auth layer).
pub type UserId = i64;
/// SQLite row id of a goal.
pub type GoalId = i64;
/// SQLite row id of a milestone.
pub type MilestoneId = i64;

/// Wall-clock timestamps are stored as UTC.
pub type Timestamp = DateTime<Utc>;

/// Lower bound of `completion_status` and `progress_value`.
pub const MIN_PERCENT: f64 = 0.0;
/// Upper bound of `completion_status` and `progress_value`.
pub const MAX_PERCENT: f64 = 100.0;

/// Check that a percentage lies in `[0, 100]`.
pub fn check_percent(value: f64) -> Result<f64, String> {
    if value.is_finite() && (MIN_PERCENT..=MAX_PERCENT).contains(&value) {
        Ok(value)
    } else {
        Err(format!("value must be between 0 and 100, got {}", value))
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
    Abandoned,
    Deferred,
}

impl GoalStatus {
    pub const ALL: [GoalStatus; 4] = [
        GoalStatus::Active,
        GoalStatus::Completed,
        GoalStatus::Abandoned,
        GoalStatus::Deferred,
    ];

    /// Status after `completion_status` changed to `completion`.
    ///
    /// Only `active -> completed` happens automatically, and only at 100.
    /// A lower value never moves a completed goal back to active.
    pub fn after_completion(self, completion: f64) -> Self {
        match self {
            GoalStatus::Active if completion >= MAX_PERCENT => GoalStatus::Completed,
            other => other,
        }
    }

    /// Status after a progress entry was deleted and `completion` is the
    /// recomputed value. Unlike [`after_completion`](Self::after_completion)
    /// this reopens a completed goal that fell below 100.
    pub fn after_retraction(self, completion: f64) -> Self {
        match self {
            GoalStatus::Completed if completion < MAX_PERCENT => GoalStatus::Active,
            other => other.after_completion(completion),
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalStatus::Active => write!(f, "active"),
            GoalStatus::Completed => write!(f, "completed"),
            GoalStatus::Abandoned => write!(f, "abandoned"),
            GoalStatus::Deferred => write!(f, "deferred"),
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            "abandoned" => Ok(GoalStatus::Abandoned),
            "deferred" => Ok(GoalStatus::Deferred),
            _ => Err(format!(
                "Invalid goal status '{}'. Must be one of: active, completed, abandoned, deferred",
                s
            )),
        }
    }
}

/// Lifecycle of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Missed,
}

impl MilestoneStatus {
    pub const ALL: [MilestoneStatus; 4] = [
        MilestoneStatus::Pending,
        MilestoneStatus::InProgress,
        MilestoneStatus::Completed,
        MilestoneStatus::Missed,
    ];

    /// Same rule as [`GoalStatus::after_completion`]: open milestones
    /// complete at 100, nothing reverts automatically.
    pub fn after_completion(self, completion: f64) -> Self {
        match self {
            MilestoneStatus::Pending | MilestoneStatus::InProgress
                if completion >= MAX_PERCENT =>
            {
                MilestoneStatus::Completed
            }
            other => other,
        }
    }

    /// Milestone counterpart of [`GoalStatus::after_retraction`].
    pub fn after_retraction(self, completion: f64) -> Self {
        match self {
            MilestoneStatus::Completed if completion <= MIN_PERCENT => MilestoneStatus::Pending,
            MilestoneStatus::Completed if completion < MAX_PERCENT => MilestoneStatus::InProgress,
            other => other.after_completion(completion),
        }
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MilestoneStatus::Pending => write!(f, "pending"),
            MilestoneStatus::InProgress => write!(f, "in_progress"),
            MilestoneStatus::Completed => write!(f, "completed"),
            MilestoneStatus::Missed => write!(f, "missed"),
        }
    }
}

impl std::str::FromStr for MilestoneStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(MilestoneStatus::Pending),
            "in_progress" => Ok(MilestoneStatus::InProgress),
            "completed" => Ok(MilestoneStatus::Completed),
            "missed" => Ok(MilestoneStatus::Missed),
            _ => Err(format!(
                "Invalid milestone status '{}'. Must be one of: pending, in_progress, completed, missed",
                s
            )),
        }
    }
}

/// Kind of a progress log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressType {
    /// Completion snapshot; drives `completion_status`.
    #[default]
    Progress,
    /// Effort estimate; logged only.
    Effort,
}

impl fmt::Display for ProgressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressType::Progress => write!(f, "progress"),
            ProgressType::Effort => write!(f, "effort"),
        }
    }
}

impl std::str::FromStr for ProgressType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "progress" => Ok(ProgressType::Progress),
            "effort" => Ok(ProgressType::Effort),
            _ => Err(format!(
                "Invalid progress type '{}'. Must be progress or effort",
                s
            )),
        }
    }
}

// =============================================================================
// Domain Structs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub user_id: UserId,
    pub title: String,
    pub start_date: Timestamp,
    pub target_date: Timestamp,
    pub completion_status: f64,
    pub status: GoalStatus,
    pub parent_goal_id: Option<GoalId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub goal_id: GoalId,
    pub title: String,
    pub target_date: Timestamp,
    pub completion_status: f64,
    pub status: MilestoneStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A reflection; unique per `(goal_id, reflection_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub id: i64,
    pub goal_id: GoalId,
    pub reflection_type: String,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One entry of the append-only progress log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub id: i64,
    pub goal_id: GoalId,
    pub milestone_id: Option<MilestoneId>,
    pub progress_value: f64,
    #[serde(rename = "type")]
    pub progress_type: ProgressType,
    pub notes: Option<String>,
    pub created_at: Timestamp,
}

/// A goal together with its milestones and reflections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDetail {
    #[serde(flatten)]
    pub goal: Goal,
    pub milestones: Vec<Milestone>,
    pub reflections: Vec<Reflection>,
}

/// Fields needed to insert a goal.
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub user_id: UserId,
    pub title: String,
    pub start_date: Timestamp,
    pub target_date: Timestamp,
    pub parent_goal_id: Option<GoalId>,
}

/// Fields needed to append a progress entry.
#[derive(Debug, Clone)]
pub struct NewProgressUpdate {
    pub goal_id: GoalId,
    pub milestone_id: Option<MilestoneId>,
    pub progress_value: f64,
    pub progress_type: ProgressType,
    pub notes: Option<String>,
}
