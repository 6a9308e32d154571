use crate::state::{AppState, RefreshOutcome, RefreshSummary};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

/// POST /refresh - Refresh the knowledge base from the document source now.
///
/// A failed refresh is reported in the body with 200, since the previous data is
/// still being served. Only a rejected trigger (another refresh running) gets 409.
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RefreshSummary>) {
    let summary = state.update_knowledge_base().await;

    let status = match summary.outcome {
        RefreshOutcome::Updated | RefreshOutcome::Unchanged | RefreshOutcome::Failed => {
            StatusCode::OK
        }
        RefreshOutcome::AlreadyRefreshing => StatusCode::CONFLICT,
        RefreshOutcome::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(summary))
}
