//! Model-output handling for Strategist.
//!
//! Finds the action directive embedded in a model message, hands it to the
//! dispatcher, and builds the text the user sees.

pub mod composer;
pub mod engine;
pub mod scanner;

pub use composer::{Composition, ResponseComposer};
pub use engine::{ActionEngine, EngineResponse};
pub use scanner::{Extraction, MarkerKind, Scanner};
