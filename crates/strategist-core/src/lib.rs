//! Shared domain types, errors, and configuration for Strategist.

pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineConfig, StrategistConfig};
pub use error::{Result, StrategistError};
pub use types::*;
