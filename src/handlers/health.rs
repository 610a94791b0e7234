use super::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{error, warn};

pub async fn home() -> &'static str {
    "Welcome to the Syllabus Chatbot API!"
}

/// Reports the API as up, and whether the fallback LLM endpoint answers
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let llm_ok = match state.chat.secondary().health_check().await {
        Ok(()) => true,
        Err(e) => {
            error!("[HEALTH] LLM connection failed: {}", e);
            false
        }
    };

    let status = if llm_ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(json!({
            "status": "ok",
            "message": "API is running",
            "llm_connection": if llm_ok { "successful" } else { "failed" },
        })),
    )
}

pub async fn not_found(uri: axum::http::Uri) -> impl IntoResponse {
    warn!("[HTTP] Resource not found: {}", uri);
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "The requested resource was not found." })),
    )
}
