//! HTTP request handlers

use super::types::{ErrorResponse, InferenceRequest, InferenceResponse, ToolSummary, ToolsResponse};
use super::AppState;
use crate::history::HistoryMessage;
use crate::llm::{ChatMessage, Role};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Inference
        .route("/", post(infer))
        // Introspection
        .route("/api/tools", get(list_tools))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Inference
// ============================================================

async fn infer(
    State(state): State<AppState>,
    payload: Result<Json<InferenceRequest>, JsonRejection>,
) -> Result<Json<InferenceResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if req.input.trim().is_empty() {
        return Err(AppError::BadRequest("input must not be empty".to_string()));
    }

    let session_id = req
        .session_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let prior = if state.replay_history {
        load_prior(&state, &session_id).await
    } else {
        Vec::new()
    };

    let result = state
        .runtime
        .run(&session_id, &req.input, prior)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!(
        session_id = %session_id,
        turns = result.turns,
        messages = result.messages.len(),
        "Inference completed"
    );

    for (role, content) in [(Role::User, req.input.as_str()), (Role::Assistant, result.output.as_str())] {
        if let Err(e) = state.history.append(&session_id, role, content).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to store history");
        }
    }

    Ok(Json(InferenceResponse {
        session_id,
        output: result.output,
    }))
}

/// Stored turns for the session; a read failure means starting fresh
async fn load_prior(state: &AppState, session_id: &str) -> Vec<ChatMessage> {
    match state.history.list(session_id).await {
        Ok(messages) => messages
            .into_iter()
            .map(HistoryMessage::into_chat_message)
            .collect(),
        Err(e) => {
            tracing::warn!(session_id, error = %e, "Failed to load history");
            Vec::new()
        }
    }
}

// ============================================================
// Introspection
// ============================================================

async fn list_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    let tools = state
        .registry
        .catalog()
        .iter()
        .map(|tool| ToolSummary {
            name: tool.name.clone(),
            description: tool.description.clone(),
        })
        .collect();

    Json(ToolsResponse {
        tools,
        servers: state.registry.connection_count(),
        prompt_fragments: state.registry.prompt_fragments().len(),
    })
}

async fn get_version() -> &'static str {
    concat!("switchboard ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
