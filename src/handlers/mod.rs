pub mod health;
pub mod methods;
pub mod refresh;
pub mod search;
pub mod status;

pub use health::{health_handler, ready_handler};
pub use methods::{knowledge_base_handler, list_methods_handler, method_details_handler};
pub use refresh::refresh_handler;
pub use search::search_handler;
pub use status::status_handler;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// All knowledge base routes, without middleware or the metrics endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(search_handler))
        .route("/methods", get(list_methods_handler))
        .route("/methods/:key", get(method_details_handler))
        .route("/knowledge-base", get(knowledge_base_handler))
        .route("/refresh", post(refresh_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}
