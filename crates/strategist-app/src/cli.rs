//! CLI argument definitions for the `strategist` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use strategist_core::config::StrategistConfig;
use strategist_core::types::{GoalId, UserId};

/// Strategist: applies goal-tracking actions embedded in model output.
#[derive(Parser, Debug)]
#[command(name = "strategist", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database.
    #[arg(short = 'd', long = "database", global = true)]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run one model message through the action engine and print the response.
    Process {
        #[arg(short = 'u', long = "user")]
        user: UserId,
        /// Goal the conversation is about.
        #[arg(short = 'g', long = "goal")]
        goal: Option<GoalId>,
        /// Message text. Read from stdin when omitted.
        #[arg(short = 't', long = "text")]
        text: Option<String>,
    },
    /// List a user's goals.
    Goals {
        #[arg(short = 'u', long = "user")]
        user: UserId,
    },
    /// Show one goal with its milestones, reflections and progress log.
    Show {
        goal: GoalId,
        #[arg(short = 'u', long = "user")]
        user: UserId,
        #[arg(long = "history", default_value_t = 10)]
        history: u32,
    },
    /// Goal counts, average completion, and goals due soon.
    Summary {
        #[arg(short = 'u', long = "user")]
        user: UserId,
        #[arg(long = "days", default_value_t = 7)]
        days: i64,
    },
    /// Delete one progress entry and recompute the goal's completion.
    DeleteProgress {
        goal: GoalId,
        update: i64,
        #[arg(short = 'u', long = "user")]
        user: UserId,
    },
    /// Write a default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long = "force")]
        force: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > STRATEGIST_CONFIG env var > ~/.strategist/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("STRATEGIST_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the database path.
    ///
    /// Priority: --database flag > STRATEGIST_DB env var > config file value.
    pub fn resolve_database_path(&self, config: &StrategistConfig) -> PathBuf {
        if let Some(ref p) = self.database {
            return p.clone();
        }
        if let Ok(p) = std::env::var("STRATEGIST_DB") {
            return PathBuf::from(p);
        }
        config.database_path()
    }

    /// Resolve the log level: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &StrategistConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".strategist").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".strategist").join("config.toml");
    }
    PathBuf::from("config.toml")
}
