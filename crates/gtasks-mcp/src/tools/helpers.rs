//! Shared helper functions for MCP tool implementations.

use gtasks_client::GTasksError;
use serde::Serialize;

/// Build a structured error JSON string that LLMs can parse.
pub fn error_json(error_code: &str, message: &str) -> String {
    serde_json::json!({
        "error": error_code,
        "message": message,
        "retryable": false,
        "reauthenticate": false
    })
    .to_string()
}

/// Render a taxonomy error with its recovery hints.
pub fn operation_error_json(error: &GTasksError) -> String {
    serde_json::json!({
        "error": error.error_code(),
        "message": error.to_string(),
        "retryable": error.is_retryable(),
        "reauthenticate": error.requires_reauthentication()
    })
    .to_string()
}

/// Pretty JSON for a successful result.
pub fn result_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| error_json("serialization_error", &e.to_string()))
}
