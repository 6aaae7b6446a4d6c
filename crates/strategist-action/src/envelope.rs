//! Envelope validation.
//!
//! Only the envelope shape is checked here; field-level validation belongs
//! to the handlers.

use serde_json::{Map, Value};

use crate::error::EnvelopeError;
use crate::types::ActionEnvelope;

/// Parse a JSON candidate into an [`ActionEnvelope`].
pub fn parse_envelope(candidate: &str) -> Result<ActionEnvelope, EnvelopeError> {
    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;
    envelope_from_value(value)
}

/// Validate an already-parsed JSON value.
pub fn envelope_from_value(value: Value) -> Result<ActionEnvelope, EnvelopeError> {
    let Value::Object(mut object) = value else {
        return Err(EnvelopeError::NotAnObject);
    };

    let action_type = match object.remove("action_type") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(EnvelopeError::MissingActionType),
    };

    let data = match object.remove("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(EnvelopeError::DataNotAnObject),
    };

    let display_message = match object.remove("display_message") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    };

    Ok(ActionEnvelope {
        action_type,
        data,
        display_message,
    })
}
