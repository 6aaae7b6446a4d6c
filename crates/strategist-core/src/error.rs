use thiserror::Error;

/// Top-level error type for the Strategist system.
///
/// Subsystem crates define their own error types and implement
/// `From<StrategistError>` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StrategistError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<toml::de::Error> for StrategistError {
    fn from(err: toml::de::Error) -> Self {
        StrategistError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StrategistError {
    fn from(err: toml::ser::Error) -> Self {
        StrategistError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for StrategistError {
    fn from(err: serde_json::Error) -> Self {
        StrategistError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Strategist operations.
pub type Result<T> = std::result::Result<T, StrategistError>;
