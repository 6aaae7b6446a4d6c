use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StrategistError};

/// Upper bound for `engine.fallback_target_days` (ten years).
pub const MAX_FALLBACK_TARGET_DAYS: i64 = 3650;

/// Top-level configuration for Strategist.
///
/// Loaded from `~/.strategist/config.toml` by default. Every section falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategistConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl StrategistConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StrategistConfig = toml::from_str(&content)?;
        config.engine.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Full path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.general.data_dir).join(&self.storage.database_file)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the database. A leading `~` is expanded.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.strategist/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name inside `general.data_dir`.
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "strategist.db".to_string(),
        }
    }
}

/// Settings for the action extraction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Label phrases that may introduce a directive ("Here's the action:").
    /// Matched case-insensitively.
    pub label_markers: Vec<String>,
    /// Days added to today when a goal's target date cannot be parsed.
    pub fallback_target_days: i64,
    /// Shown when removing the directive leaves nothing to display.
    pub fallback_message: String,
    /// Remove directives with an unregistered `action_type` from the text.
    /// When false the text passes through unchanged.
    pub strip_unknown_directives: bool,
    /// Forward change descriptions to the notifier.
    pub notify_changes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            label_markers: vec![
                "Here's the action:".to_string(),
                "Here is the action:".to_string(),
                "Action JSON:".to_string(),
                "JSON output:".to_string(),
            ],
            fallback_target_days: 90,
            fallback_message: "I couldn't apply that change right now, but I've noted it."
                .to_string(),
            strip_unknown_directives: false,
            notify_changes: true,
        }
    }
}

impl EngineConfig {
    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_FALLBACK_TARGET_DAYS).contains(&self.fallback_target_days) {
            return Err(StrategistError::Config(format!(
                "engine.fallback_target_days must be between 1 and {}, got {}",
                MAX_FALLBACK_TARGET_DAYS, self.fallback_target_days
            )));
        }
        if self.label_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(StrategistError::Config(
                "engine.label_markers must not contain blank entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~") {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        return PathBuf::from(home).join(rest.trim_start_matches(['/', '\\']));
    }
    PathBuf::from(path)
}
