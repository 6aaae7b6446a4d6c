//! Action dispatch for Strategist.
//!
//! Validates action envelopes emitted by the model, routes them through a
//! registry of pluggable handlers, and applies each one as a single
//! transaction against the goal store.

pub mod dates;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod handler;
pub mod notifier;
pub mod types;

pub use dispatcher::{ActionDispatcher, Dispatch, DispatchReport};
pub use envelope::parse_envelope;
pub use error::{ActionError, EnvelopeError, ErrorKind};
pub use handler::{ActionHandler, ActionRegistry};
pub use notifier::{ChangeEvent, ChangeNotifier, LogNotifier, RecordingNotifier};
pub use types::{ActionContext, ActionEnvelope, ActionOutcome, ActionResult, HandlerOutcome};
