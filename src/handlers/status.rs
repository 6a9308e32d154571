use crate::state::{AppState, KnowledgeBaseStatus};
use axum::{extract::State, Json};
use std::sync::Arc;

/// GET /status - Store contents and refresh scheduler state.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<KnowledgeBaseStatus> {
    Json(state.get_knowledge_base_status())
}
