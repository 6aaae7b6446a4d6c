//! Strategist application binary - composition root.
//!
//! 1. Parse arguments and load configuration from TOML
//! 2. Initialise tracing (RUST_LOG > --log-level > config)
//! 3. Open the goal database
//! 4. Run the requested command and print JSON to stdout

mod cli;

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use strategist_action::ActionContext;
use strategist_chat::ActionEngine;
use strategist_core::config::StrategistConfig;
use strategist_core::error::StrategistError;
use strategist_storage::{Database, GoalRepository, SummaryService};

use crate::cli::{CliArgs, Command};

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_database(args: &CliArgs, config: &StrategistConfig) -> Result<Arc<Database>, StrategistError> {
    let path = args.resolve_database_path(config);
    let db = Database::new(&path)?;
    tracing::debug!(path = %path.display(), "Database ready");
    Ok(Arc::new(db))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), StrategistError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(args: &CliArgs, config: &StrategistConfig) -> Result<(), StrategistError> {
    match &args.command {
        Command::Process { user, goal, text } => {
            let text = match text {
                Some(text) => text.clone(),
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let ctx = match goal {
                Some(goal_id) => ActionContext::new(*user).with_goal(*goal_id),
                None => ActionContext::new(*user),
            };
            let engine = ActionEngine::new(open_database(args, config)?, &config.engine);
            print_json(&engine.process(&text, &ctx))
        }
        Command::Goals { user } => {
            let goals = GoalRepository::new(open_database(args, config)?).list_for_user(*user)?;
            print_json(&goals)
        }
        Command::Show {
            goal,
            user,
            history,
        } => {
            let repo = GoalRepository::new(open_database(args, config)?);
            let detail = repo.detail(*goal, *user)?.ok_or_else(|| {
                StrategistError::InvalidInput(format!("goal {} not found for user {}", goal, user))
            })?;
            let progress = repo.progress_history(*goal, *user, *history)?;
            print_json(&json!({"goal": detail, "progress": progress}))
        }
        Command::Summary { user, days } => {
            let summary = SummaryService::new(open_database(args, config)?).summary(*user, *days)?;
            print_json(&summary)
        }
        Command::DeleteProgress { goal, update, user } => {
            let repo = GoalRepository::new(open_database(args, config)?);
            let goal = repo.delete_progress_update(*goal, *update, *user)?.ok_or_else(|| {
                StrategistError::InvalidInput(format!(
                    "progress update {} not found on goal {} for user {}",
                    update, goal, user
                ))
            })?;
            print_json(&goal)
        }
        Command::InitConfig { force } => {
            let path = args.resolve_config_path();
            if path.exists() && !force {
                return Err(StrategistError::InvalidInput(format!(
                    "{} already exists, pass --force to overwrite",
                    path.display()
                )));
            }
            StrategistConfig::default().save(&path)?;
            print_json(&json!({"config": path.display().to_string()}))
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let loaded = if config_path.exists() {
        Some(StrategistConfig::load(&config_path))
    } else {
        None
    };
    let config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => StrategistConfig::default(),
    };

    init_tracing(&args.resolve_log_level(&config));
    tracing::info!("Starting Strategist v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Some(Ok(_)) => tracing::info!(path = %config_path.display(), "Configuration loaded"),
        Some(Err(e)) => tracing::warn!(
            path = %config_path.display(),
            error = %e,
            "Invalid configuration, using defaults"
        ),
        None => tracing::debug!(path = %config_path.display(), "No configuration file, using defaults"),
    }

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
