//! Strategist storage crate - SQLite persistence for goals and their children.
//!
//! Provides a WAL-mode SQLite database with versioned migrations, row-level
//! functions that run inside a caller's transaction, and read-side
//! repositories for goals and progress summaries.

pub mod db;
pub mod migrations;
pub mod queries;
pub mod repository;

pub use db::Database;
pub use queries::{DueGoal, ProgressSummary, RecentUpdate, SummaryService};
pub use repository::{GoalLookup, GoalRepository, ReflectionUpsert};

pub use rusqlite::{Connection, Transaction};
