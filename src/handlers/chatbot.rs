//! Chat with a syllabus, plus the embedding endpoints behind it

use super::AppState;
use crate::retrieval::join_context;
use crate::types::ScoredChunk;
use crate::{Error, Result};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat_with_pdf", post(chat_with_pdf))
        .route("/add_pdf_embeddings", post(add_pdf_embeddings))
        .route("/list_pdf_embeddings", get(list_pdf_embeddings))
        .route("/search", post(search))
        .route("/index_status/{pdf_id}", get(index_status))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub pdf_content: Option<String>,
    pub pdf_id: Option<String>,
    pub switch_to_groq: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEmbeddingsRequest {
    pub pdf_content: Option<String>,
    pub pdf_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub pdf_id: Option<String>,
    pub query: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub context: String,
    pub results: Vec<ScoredChunk>,
}

#[derive(Debug, Serialize)]
pub struct EmbeddedDocument {
    pub id: String,
    pub pdf_id: String,
    pub content: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub fn build_prompt(context: &str, message: &str) -> String {
    format!("PDF Content:\n{context}\nUser Message: {message}")
}

/// Answer `message` about a PDF. The caller's `pdfContent` is used verbatim
/// when present; otherwise the most relevant indexed chunks of `pdfId` are.
pub async fn chat_with_pdf(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>> {
    let message = non_empty(&request.message);
    let pdf_content = non_empty(&request.pdf_content);
    let pdf_id = non_empty(&request.pdf_id);

    let Some(message) = message.filter(|_| pdf_content.is_some() || pdf_id.is_some()) else {
        error!("[CHATBOT] Missing required parameters");
        return Err(Error::Validation(
            "Missing required parameters (message and pdfContent).".to_string(),
        ));
    };

    let context = match (pdf_content, pdf_id) {
        (Some(content), _) => content.to_string(),
        (None, Some(pdf_id)) => {
            let context = state
                .retriever
                .build_context(Some(pdf_id), message)
                .await
                .map_err(|e| {
                    error!("[CHATBOT] Retrieval failed for {}: {}", pdf_id, e);
                    Error::Internal("An internal server error occurred.".to_string())
                })?;
            if context.is_empty() {
                warn!("[CHATBOT] No indexed content for {}", pdf_id);
            }
            context
        }
        (None, None) => String::new(),
    };

    let prompt = build_prompt(&context, message);
    let allow_fallback = request.switch_to_groq.unwrap_or(true);

    match state.chat.respond(&prompt, allow_fallback).await {
        Ok(reply) => {
            info!("[CHATBOT] Answered by {:?} endpoint", reply.responder);
            Ok(Json(json!({ "response": reply.text })))
        }
        Err(Error::FallbackDeclined) => Err(Error::FallbackDeclined),
        Err(e) => {
            error!("[CHATBOT] Exception in chat_with_pdf: {}", e);
            Err(Error::Internal("An internal server error occurred.".to_string()))
        }
    }
}

pub async fn add_pdf_embeddings(
    State(state): State<AppState>,
    Json(request): Json<AddEmbeddingsRequest>,
) -> Result<Json<Value>> {
    let (Some(pdf_content), Some(pdf_id)) =
        (non_empty(&request.pdf_content), non_empty(&request.pdf_id))
    else {
        error!("[CHATBOT] Invalid input data for embedding");
        return Err(Error::Validation(
            "Invalid input. Please provide PDF content and PDF ID.".to_string(),
        ));
    };

    let stats = state
        .indexer
        .index_text(pdf_id, pdf_content)
        .await
        .map_err(|e| {
            error!("[CHATBOT] Failed to add embeddings for {}: {}", pdf_id, e);
            Error::Internal("Failed to add PDF embeddings.".to_string())
        })?;

    info!("[CHATBOT] Embeddings added for {} ({} chunks)", pdf_id, stats.total_chunks);
    Ok(Json(json!({
        "message": "PDF content embeddings added successfully.",
        "chunks": stats.total_chunks,
    })))
}

pub async fn list_pdf_embeddings(State(state): State<AppState>) -> Result<Json<Value>> {
    let records = state.retriever.vectors().list().await.map_err(|e| {
        error!("[CHATBOT] Failed to list PDF embeddings: {}", e);
        Error::Internal("Failed to list PDF embeddings.".to_string())
    })?;

    let documents: Vec<EmbeddedDocument> = records
        .into_iter()
        .map(|record| EmbeddedDocument {
            id: record.id,
            pdf_id: record.pdf_id,
            content: record.content,
        })
        .collect();

    Ok(Json(json!({ "documents": documents })))
}

/// Ranked chunks for a query, within one PDF or across all of them
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let Some(query) = non_empty(&request.query) else {
        return Err(Error::Validation(
            "Missing required parameter (query).".to_string(),
        ));
    };

    let top_k = request.top_k.unwrap_or(state.retriever.default_top_k());
    let results = state
        .retriever
        .search(non_empty(&request.pdf_id), query, top_k)
        .await?;

    Ok(Json(SearchResponse {
        context: join_context(&results),
        results,
    }))
}

pub async fn index_status(
    State(state): State<AppState>,
    Path(pdf_id): Path<String>,
) -> Result<Json<Value>> {
    let snapshot = state.indexer.snapshot().lock().await;
    let info = snapshot
        .get(&pdf_id)
        .ok_or_else(|| Error::NotFound("No index status for this PDF.".to_string()))?;

    let mut body = serde_json::to_value(info)?;
    if let Value::Object(map) = &mut body {
        map.insert("pdfId".to_string(), Value::String(pdf_id.clone()));
    }
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout() {
        assert_eq!(
            build_prompt("Exam on May 5.", "When is the exam?"),
            "PDF Content:\nExam on May 5.\nUser Message: When is the exam?"
        );
    }

    #[test]
    fn test_chat_request_uses_camel_case() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"message":"hi","pdfId":"abc","switchToGroq":false}"#,
        )
        .unwrap();
        assert_eq!(request.pdf_id.as_deref(), Some("abc"));
        assert_eq!(request.switch_to_groq, Some(false));
        assert!(request.pdf_content.is_none());
    }
}
