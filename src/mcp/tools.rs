//! MCP tool and resource definitions.

use super::protocol::{ResourceDefinition, ToolDefinition};
use serde_json::json;

pub const SEARCH_API_METHODS: &str = "search_api_methods";
pub const GET_API_METHOD_DETAILS: &str = "get_api_method_details";
pub const LIST_ALL_API_METHODS: &str = "list_all_api_methods";
pub const UPDATE_KNOWLEDGE_BASE: &str = "update_knowledge_base";
pub const GET_KNOWLEDGE_BASE_STATUS: &str = "get_knowledge_base_status";

pub const KNOWLEDGE_BASE_URI: &str = "kb://knowledge-base";

/// Maximum search hits returned by the search tool. The total is always reported.
pub const SEARCH_RESULT_LIMIT: usize = 10;

pub fn all_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEARCH_API_METHODS.to_string(),
            description: "Search API methods by keyword in name, endpoint or description (case-insensitive)".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query for API methods"}
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: GET_API_METHOD_DETAILS.to_string(),
            description: "Get endpoint, HTTP method, parameters, example and response of one API method".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "method_name": {"type": "string", "description": "Exact method key, e.g. openDoor"}
                },
                "required": ["method_name"]
            }),
        },
        ToolDefinition {
            name: LIST_ALL_API_METHODS.to_string(),
            description: "List all API methods in the knowledge base, grouped by resource".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: UPDATE_KNOWLEDGE_BASE.to_string(),
            description: "Refresh the knowledge base from the documentation source now".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: GET_KNOWLEDGE_BASE_STATUS.to_string(),
            description: "Method count, last update time and refresh state of the knowledge base".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}

pub fn all_resources() -> Vec<ResourceDefinition> {
    vec![ResourceDefinition {
        uri: KNOWLEDGE_BASE_URI.to_string(),
        name: "API Knowledge Base".to_string(),
        description: "Complete API method documentation as one JSON object".to_string(),
        mime_type: "application/json".to_string(),
    }]
}
