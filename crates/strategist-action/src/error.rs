//! Error types for action dispatch.

use std::fmt;

use strategist_core::error::StrategistError;

/// Errors from action handler execution.
///
/// None of these escape the dispatcher: each one is turned into a failed
/// `ActionResult` and logged according to its [`ErrorKind`].
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{entity} {id} is not accessible")]
    Ownership { entity: &'static str, id: i64 },
    #[error("Storage error: {0}")]
    Storage(#[from] StrategistError),
    #[error("Action handler panicked: {0}")]
    Panicked(String),
}

impl ActionError {
    pub fn validation(message: impl Into<String>) -> Self {
        ActionError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Validation(_) => ErrorKind::Validation,
            ActionError::NotFound { .. } => ErrorKind::NotFound,
            ActionError::Ownership { .. } => ErrorKind::Ownership,
            ActionError::Storage(_) => ErrorKind::Persistence,
            ActionError::Panicked(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        ActionError::Storage(StrategistError::from(err))
    }
}

/// Coarse classification used for log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Ownership,
    Persistence,
    Internal,
}

impl ErrorKind {
    /// Failures caused by the request rather than by the system.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Ownership
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Ownership => write!(f, "ownership"),
            ErrorKind::Persistence => write!(f, "persistence"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Reasons a JSON candidate is not an action envelope.
///
/// The scanner treats all of these as "no directive here" and keeps looking.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Envelope must be a JSON object")]
    NotAnObject,
    #[error("Envelope has no string action_type")]
    MissingActionType,
    #[error("Envelope data must be a JSON object")]
    DataNotAnObject,
}
