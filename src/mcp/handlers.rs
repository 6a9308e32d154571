//! MCP tool call handlers.

use super::protocol::{ReadResourceResult, ResourceContents, ToolCallResult};
use super::tools::*;
use crate::error::AppError;
use crate::knowledge::entries_to_value;
use crate::state::AppState;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Dispatches MCP tool calls to the knowledge base operations.
pub struct ToolHandler {
    state: Arc<AppState>,
}

impl ToolHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Run one tool. Unknown tools and missing arguments are reported as tool
    /// errors, not protocol errors, so the agent can read and correct them.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> ToolCallResult {
        let args = arguments.unwrap_or_else(|| json!({}));
        debug!(tool = name, "Handling tool call");

        match name {
            SEARCH_API_METHODS => match string_arg(&args, "query") {
                Ok(query) => self.search(query),
                Err(msg) => ToolCallResult::error(msg),
            },
            GET_API_METHOD_DETAILS => match string_arg(&args, "method_name") {
                Ok(key) => self.details(key),
                Err(msg) => ToolCallResult::error(msg),
            },
            LIST_ALL_API_METHODS => self.list_all(),
            UPDATE_KNOWLEDGE_BASE => {
                info!("Knowledge base refresh requested over MCP");
                let summary = self.state.update_knowledge_base().await;
                to_text(&summary)
            }
            GET_KNOWLEDGE_BASE_STATUS => to_text(&self.state.get_knowledge_base_status()),
            _ => ToolCallResult::error(format!("Unknown tool: {}", name)),
        }
    }

    /// Read a resource by URI.
    pub fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, AppError> {
        if uri != KNOWLEDGE_BASE_URI {
            return Err(AppError::ValidationError(format!("Unknown resource: {}", uri)));
        }

        let snapshot = self.state.store.snapshot();
        let text = serde_json::to_string_pretty(&entries_to_value(snapshot.entries()))
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: uri.to_string(),
                mime_type: "application/json".to_string(),
                text,
            }],
        })
    }

    fn search(&self, query: &str) -> ToolCallResult {
        let (total, results) = self.state.queries.search_limited(query, SEARCH_RESULT_LIMIT);
        metrics::counter!("search_requests_total").increment(1);

        let results: Vec<Value> = results
            .into_iter()
            .map(|(key, record)| {
                json!({
                    "key": key,
                    "method": record.http_method,
                    "endpoint": record.endpoint,
                    "description": record.description,
                })
            })
            .collect();

        to_text(&json!({
            "query": query,
            "total": total,
            "shown": results.len(),
            "results": results,
        }))
    }

    fn details(&self, key: &str) -> ToolCallResult {
        match self.state.get_api_method_details(key) {
            Ok(record) => to_text(&json!({ "key": key, "record": record })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn list_all(&self) -> ToolCallResult {
        let methods = self.state.list_all_api_methods();
        if methods.is_empty() {
            return ToolCallResult::text(
                "No API methods available in the knowledge base. Try update_knowledge_base.".to_string(),
            );
        }

        let summaries: Vec<Value> = methods
            .into_iter()
            .map(|m| {
                json!({
                    "key": m.key,
                    "name": m.record.name,
                    "method": m.record.http_method,
                    "endpoint": m.record.endpoint,
                })
            })
            .collect();

        to_text(&json!({
            "total": summaries.len(),
            "groups": self.state.group_api_methods(),
            "methods": summaries,
        }))
    }
}

fn string_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str, String> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing required string argument '{}'", name))
}

fn to_text<T: Serialize>(value: &T) -> ToolCallResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ToolCallResult::text(text),
        Err(e) => ToolCallResult::error(format!("Failed to serialize result: {}", e)),
    }
}
