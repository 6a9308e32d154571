use crate::error::Result;
use crate::knowledge::{entries_to_value, MethodRecord};
use crate::state::{AppState, KeyedMethod};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ListMethodsResponse {
    pub total: usize,
    pub methods: Vec<KeyedMethod>,
    /// Method keys grouped by endpoint resource
    pub groups: BTreeMap<String, Vec<String>>,
}

/// GET /methods - Every method in knowledge base order.
pub async fn list_methods_handler(State(state): State<Arc<AppState>>) -> Json<ListMethodsResponse> {
    let methods = state.list_all_api_methods();

    Json(ListMethodsResponse {
        total: methods.len(),
        groups: state.group_api_methods(),
        methods,
    })
}

/// GET /methods/:key - One method by exact key. 404 when absent.
pub async fn method_details_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<MethodRecord>> {
    state.get_api_method_details(&key).map(Json)
}

/// GET /knowledge-base - The whole mapping as one JSON object, in knowledge base order.
pub async fn knowledge_base_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.store.snapshot();
    Json(entries_to_value(snapshot.entries()))
}
