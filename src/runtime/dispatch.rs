//! Tool call dispatch
//!
//! Calls run one at a time in the order the model asked for them. Every
//! failure becomes text for the model; nothing here can end a run.

use crate::llm::ToolCallRequest;
use crate::registry::ToolRegistry;
use crate::state_machine::ToolOutcome;
use serde_json::{Map, Value};

/// Run every call in order
pub async fn dispatch_all(registry: &ToolRegistry, calls: &[ToolCallRequest]) -> Vec<ToolOutcome> {
    let mut outcomes = Vec::with_capacity(calls.len());
    for call in calls {
        let output = dispatch_one(registry, call).await;
        outcomes.push(ToolOutcome::new(call.id.clone(), output));
    }
    outcomes
}

async fn dispatch_one(registry: &ToolRegistry, call: &ToolCallRequest) -> String {
    let arguments = match parse_arguments(&call.arguments) {
        Ok(arguments) => arguments,
        Err(reason) => {
            tracing::warn!(tool = %call.name, error = %reason, "Unparseable tool arguments");
            return format!("Error: could not parse arguments for tool {}: {reason}", call.name);
        }
    };

    if registry.is_empty() {
        tracing::warn!(tool = %call.name, "No tool connections available");
        return format!("Error: no tool connections available for tool {}", call.name);
    }

    let Some(conn) = registry.lookup(&call.name) else {
        tracing::warn!(tool = %call.name, "Tool not found");
        return format!("Error: tool not found: {}", call.name);
    };

    let start = std::time::Instant::now();
    match conn.invoke(&call.name, arguments).await {
        Ok(result) => {
            tracing::info!(
                tool = %call.name,
                server = conn.name(),
                is_error = result.is_error,
                duration_ms = %start.elapsed().as_millis(),
                "Tool call completed"
            );
            result.into_output()
        }
        Err(e) => {
            tracing::error!(
                tool = %call.name,
                server = conn.name(),
                error = %e,
                duration_ms = %start.elapsed().as_millis(),
                "Tool call failed"
            );
            format!("Error executing tool {}: {e}", call.name)
        }
    }
}

/// Parse the model's argument text into a JSON object.
///
/// Blank text means no arguments.
pub fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(e.to_string()),
    }
}
