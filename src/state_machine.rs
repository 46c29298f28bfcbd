//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern: a pure transition function over
//! an explicit state enum, with I/O described as effects for the runtime.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Event, ToolOutcome};
pub use state::{ConvContext, ConvState, RunError};
pub use transition::transition;
