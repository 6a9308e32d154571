use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub methods: usize,
}

impl HealthResponse {
    fn new(status: &'static str, state: &AppState) -> Json<Self> {
        Json(Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            methods: state.store.snapshot().len(),
        })
    }
}

/// GET /health - Liveness probe. Healthy even while the knowledge base is empty.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    HealthResponse::new("healthy", &state)
}

/// GET /ready - 200 once a snapshot is loaded (from cache or a refresh), 503 before.
pub async fn ready_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    if state.is_ready() {
        (StatusCode::OK, HealthResponse::new("ready", &state))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse::new("not_ready", &state),
        )
    }
}
