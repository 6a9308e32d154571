//! Keyword search over the knowledge base.

use crate::state::{AppState, KeyedMethod};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Keyword matched case-insensitively against name, endpoint and description
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub results: Vec<KeyedMethod>,
}

/// POST /search - Find methods whose name, endpoint or description contains the query.
///
/// Results keep knowledge base order. A blank query returns no results rather
/// than the whole base.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Json<SearchResponse> {
    let start_time = std::time::Instant::now();
    let results = state.search_api_methods(&request.query);

    metrics::histogram!("search_latency_ms").record(start_time.elapsed().as_millis() as f64);

    Json(SearchResponse {
        query: request.query,
        total: results.len(),
        results,
    })
}
