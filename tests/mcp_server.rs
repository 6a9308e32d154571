//! MCP server tests: JSON-RPC session handling and tool calls against a loaded base.

use api_docs_kb::knowledge::{parse_method_map, MethodEntries};
use api_docs_kb::mcp::McpServer;
use api_docs_kb::{AppState, Config, DocumentSource, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Notify;

async fn loaded_state(dir: &TempDir) -> Arc<AppState> {
    let docs = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/api_methods.json");
    let state = AppState::new(Config::with_docs_file(docs, dir.path().join("kb.json")));
    assert!(state.update_knowledge_base().await.success);
    Arc::new(state)
}

async fn initialized_server(state: Arc<AppState>) -> McpServer {
    let server = McpServer::new(state);
    let response = server
        .handle_message(&request(0, "initialize", json!({
            "protocolVersion": "2024-11-05",
            "clientInfo": { "name": "test-agent", "version": "1.0" }
        })))
        .await
        .unwrap();
    assert!(response.error.is_none());
    server
}

fn frame(line: String) -> Vec<u8> {
    let mut bytes = line.into_bytes();
    bytes.push(b'\n');
    bytes
}

fn request(id: u64, method: &str, params: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }).to_string()
}

/// Call a tool and return (isError, parsed-or-raw text payload).
async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> (bool, Value) {
    let response = server
        .handle_message(&request(7, "tools/call", json!({ "name": name, "arguments": arguments })))
        .await
        .unwrap();
    let result = response.result.expect("tool call returns a result");

    let text = result["content"][0]["text"].as_str().unwrap().to_string();
    let payload = serde_json::from_str(&text).unwrap_or(Value::String(text));
    (result["isError"].as_bool().unwrap(), payload)
}

#[tokio::test]
async fn test_initialize_reports_server_info() {
    let dir = TempDir::new().unwrap();
    let server = McpServer::new(loaded_state(&dir).await);

    let response = server
        .handle_message(&request(1, "initialize", json!({ "protocolVersion": "2024-11-05" })))
        .await
        .unwrap();
    let result = response.result.unwrap();

    assert_eq!(response.id, json!(1));
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "api-docs-kb");
    assert!(result["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_requests_before_initialize_are_rejected() {
    let dir = TempDir::new().unwrap();
    let server = McpServer::new(loaded_state(&dir).await);

    let response = server
        .handle_message(&request(1, "tools/list", json!({})))
        .await
        .unwrap();

    assert!(response.result.is_none());
    assert_eq!(response.error.unwrap().code, -32600);
}

#[tokio::test]
async fn test_notification_has_no_response() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let notification = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    assert!(server.handle_message(&notification.to_string()).await.is_none());
}

#[tokio::test]
async fn test_malformed_and_unknown_messages() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let parse = server.handle_message("{ not json").await.unwrap();
    assert_eq!(parse.error.unwrap().code, -32700);

    let unknown = server
        .handle_message(&request(2, "prompts/list", json!({})))
        .await
        .unwrap();
    assert_eq!(unknown.error.unwrap().code, -32601);
}

#[tokio::test]
async fn test_tools_list_has_five_tools() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let response = server
        .handle_message(&request(2, "tools/list", json!({})))
        .await
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();

    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "search_api_methods",
            "get_api_method_details",
            "list_all_api_methods",
            "update_knowledge_base",
            "get_knowledge_base_status",
        ]
    );
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
}

#[tokio::test]
async fn test_search_tool() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let (is_error, payload) = call_tool(&server, "search_api_methods", json!({ "query": "camera" })).await;

    assert!(!is_error);
    assert_eq!(payload["total"], 1);
    assert_eq!(payload["results"][0]["key"], "captureSnapshot");
}

#[tokio::test]
async fn test_search_tool_requires_query() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let (is_error, payload) = call_tool(&server, "search_api_methods", json!({})).await;

    assert!(is_error);
    assert!(payload.as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn test_details_tool() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let (is_error, payload) =
        call_tool(&server, "get_api_method_details", json!({ "method_name": "openDoor" })).await;

    assert!(!is_error);
    assert_eq!(payload["record"]["endpoint"], "/api/v1/door/open");
    assert_eq!(payload["record"]["method"], "POST");
    assert_eq!(payload["record"]["parameters"][0]["name"], "door_id");
}

#[tokio::test]
async fn test_details_tool_not_found_is_tool_error() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let (is_error, payload) =
        call_tool(&server, "get_api_method_details", json!({ "method_name": "nonexistent" })).await;

    assert!(is_error);
    assert!(payload.as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_list_tool_groups_methods() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let (is_error, payload) = call_tool(&server, "list_all_api_methods", json!({})).await;

    assert!(!is_error);
    assert_eq!(payload["total"], 11);
    assert_eq!(payload["methods"][0]["key"], "openDoor");
    assert_eq!(payload["groups"]["system"], json!(["rebootDevice", "uploadFirmware"]));
}

#[tokio::test]
async fn test_update_and_status_tools() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let (is_error, summary) = call_tool(&server, "update_knowledge_base", json!({})).await;
    assert!(!is_error);
    assert_eq!(summary["success"], true);
    assert_eq!(summary["outcome"], "unchanged");

    let (_, status) = call_tool(&server, "get_knowledge_base_status", json!({})).await;
    assert_eq!(status["isLoaded"], true);
    assert_eq!(status["methodCount"], 11);
    assert_eq!(status["state"], "idle");
}

#[tokio::test]
async fn test_unknown_tool_is_tool_error() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let (is_error, payload) = call_tool(&server, "delete_everything", json!({})).await;

    assert!(is_error);
    assert!(payload.as_str().unwrap().contains("delete_everything"));
}

#[tokio::test]
async fn test_read_knowledge_base_resource() {
    let dir = TempDir::new().unwrap();
    let server = initialized_server(loaded_state(&dir).await).await;

    let response = server
        .handle_message(&request(3, "resources/read", json!({ "uri": "kb://knowledge-base" })))
        .await
        .unwrap();
    let result = response.result.unwrap();
    let methods: Value = serde_json::from_str(result["contents"][0]["text"].as_str().unwrap()).unwrap();

    let keys: Vec<&String> = methods.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 11);
    assert_eq!(keys[0], "openDoor");
    assert_eq!(keys[10], "getSipSettings");

    let unknown = server
        .handle_message(&request(4, "resources/read", json!({ "uri": "kb://other" })))
        .await
        .unwrap();
    assert_eq!(unknown.error.unwrap().code, -32602);
}

#[tokio::test]
async fn test_run_over_line_stream() {
    let dir = TempDir::new().unwrap();
    let server = McpServer::new(loaded_state(&dir).await);

    let input = [
        request(1, "initialize", json!({ "protocolVersion": "2024-11-05" })),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        String::new(),
        request(2, "tools/call", json!({ "name": "search_api_methods", "arguments": { "query": "door" } })),
    ]
    .join("\n");
    let mut output = Vec::new();

    server.run(input.as_bytes(), &mut output).await.unwrap();

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["id"], 2);

    let text = responses[1]["result"]["content"][0]["text"].as_str().unwrap();
    let payload: Value = serde_json::from_str(text).unwrap();
    assert_eq!(payload["total"], 2);
}

/// Source that signals when a fetch starts and holds it until released.
struct GatedSource {
    entries: MethodEntries,
    started: Notify,
    release: Notify,
}

#[async_trait]
impl DocumentSource for GatedSource {
    fn name(&self) -> &str {
        "gated"
    }

    async fn fetch(&self) -> Result<MethodEntries> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.entries.clone())
    }
}

#[tokio::test]
async fn test_reads_answered_while_refresh_in_flight() {
    let dir = TempDir::new().unwrap();
    let docs = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/api_methods.json");
    let source = Arc::new(GatedSource {
        entries: parse_method_map(&std::fs::read_to_string(&docs).unwrap()).unwrap(),
        started: Notify::new(),
        release: Notify::new(),
    });
    let state = Arc::new(AppState::with_source(
        Config::with_docs_file(&docs, dir.path().join("kb.json")),
        source.clone(),
    ));

    let (client, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let server = McpServer::new(state);
    let session = tokio::spawn(async move { server.run(BufReader::new(server_read), server_write).await });

    let (client_read, mut client_write) = tokio::io::split(client);
    let mut responses = BufReader::new(client_read).lines();
    client_write
        .write_all(&frame(request(1, "initialize", json!({ "protocolVersion": "2024-11-05" }))))
        .await
        .unwrap();
    let init: Value = serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(init["id"], 1);

    client_write
        .write_all(&frame(request(2, "tools/call", json!({ "name": "update_knowledge_base" }))))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), source.started.notified())
        .await
        .expect("refresh never reached the source");

    client_write
        .write_all(&frame(request(3, "tools/call", json!({ "name": "get_knowledge_base_status" }))))
        .await
        .unwrap();
    let line = tokio::time::timeout(Duration::from_secs(5), responses.next_line())
        .await
        .expect("status read waited behind the refresh")
        .unwrap()
        .unwrap();
    let status_response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(status_response["id"], 3);
    let status: Value =
        serde_json::from_str(status_response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(status["state"], "refreshing");
    assert_eq!(status["isLoaded"], false);

    source.release.notify_one();
    let update_response: Value =
        serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(update_response["id"], 2);
    let summary: Value =
        serde_json::from_str(update_response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(summary["success"], true);
    assert_eq!(summary["methodCount"], 11);

    client_write.shutdown().await.unwrap();
    drop(client_write);
    session.await.unwrap().unwrap();
}
