//! Switchboard - conversational orchestration service
//!
//! Answers plain-text requests by looping between an OpenAI-compatible
//! completion endpoint and a set of external tool servers.

mod api;
mod config;
mod history;
mod llm;
mod registry;
mod runtime;
mod state_machine;
mod system_prompt;
mod tool_server;

use api::{create_router, AppState};
use config::Config;
use llm::{LlmService, LoggingService, OpenAIService};
use registry::ToolRegistry;
use runtime::ConversationRuntime;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tool_server::TransportConnector;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("switchboard={},tower_http=info", config.server.logs.level).into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // History
    let history = history::open_or_fallback(Path::new(&config.server.database_path));
    tracing::info!(backend = history.backend(), "History store ready");

    // Completion endpoint
    if config.llm.api_key.as_deref().is_none_or(str::is_empty) {
        tracing::warn!("No API key configured. Set SWITCHBOARD_API_KEY or OPENAI_API_KEY.");
    }
    let openai: Arc<dyn LlmService> = Arc::new(OpenAIService::new(&config.llm)?);
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(openai));
    tracing::info!(model = llm.model_id(), base_url = %config.llm.base_url, "Completion endpoint configured");

    // Tool servers
    let connector = TransportConnector::new(Duration::from_secs(config.server.tool_timeout_secs));
    let registry = Arc::new(ToolRegistry::build(&config.tool_servers, &connector).await);
    if registry.is_empty() {
        tracing::warn!("No tools registered; tool calls will be answered with an error");
    }

    let runtime = Arc::new(ConversationRuntime::new(
        llm,
        registry.clone(),
        config.llm.system_prompt.as_deref(),
        config.llm.max_turns,
    ));
    tracing::info!(
        system_prompt_chars = runtime.system_prompt().len(),
        max_turns = config.llm.max_turns,
        "Conversation runtime ready"
    );

    let state = AppState::new(runtime, registry.clone(), history, config.server.replay_history);
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Switchboard listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, closing tool connections");
    registry.close_all().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
