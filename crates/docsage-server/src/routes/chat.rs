//! Chat routes: grounded answers, session history, and LLM configuration.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{ApiError, ApiResult};
use crate::state::AppState;
use docsage_chat::types::*;
use docsage_core::Error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/history", get(get_history).delete(clear_history))
        .route("/chat/config", get(get_config).put(update_config))
}

/// POST /api/chat: answer a question from the indexed documents.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let question = req.message.trim();
    if question.is_empty() {
        return Err(ApiError(Error::Config("message must not be empty".into())));
    }

    let answer = state.ask(question).await?;
    Ok(Json(ChatResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}

/// GET /api/chat/history
async fn get_history(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let conversation = state.conversation.read();
    Json(serde_json::json!({ "turns": conversation.turns() }))
}

/// DELETE /api/chat/history
async fn clear_history(State(state): State<Arc<AppState>>) -> StatusCode {
    state.conversation.write().clear();
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------
// Config
// ---------------------------------------------------------------

async fn get_config(State(state): State<Arc<AppState>>) -> Json<LLMConfigResponse> {
    Json(state.llm_config.read().to_response())
}

async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<LLMConfigUpdate>,
) -> ApiResult<LLMConfigResponse> {
    let mut config = state.llm_config.write();
    config.apply_update(&update);
    config.save()?;
    Ok(Json(config.to_response()))
}
