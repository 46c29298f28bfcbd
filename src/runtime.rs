//! Runtime for executing conversations
//!
//! One [`ConversationRuntime`] is built at startup and shared by every
//! request; each call to `run` owns a fresh context.

mod dispatch;
mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
