//! HTTP API
//!
//! A single inference endpoint plus read-only introspection routes.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::history::HistoryStore;
use crate::registry::ToolRegistry;
use crate::runtime::ConversationRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ConversationRuntime>,
    pub registry: Arc<ToolRegistry>,
    pub history: Arc<dyn HistoryStore>,
    /// Seed each run with the session's stored messages
    pub replay_history: bool,
}

impl AppState {
    pub fn new(
        runtime: Arc<ConversationRuntime>,
        registry: Arc<ToolRegistry>,
        history: Arc<dyn HistoryStore>,
        replay_history: bool,
    ) -> Self {
        Self {
            runtime,
            registry,
            history,
            replay_history,
        }
    }
}
