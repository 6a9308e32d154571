//! MCP server implementation
//!
//! Speaks line-delimited JSON-RPC 2.0 over stdio (or any async reader/writer pair).
//! Tool calls run as their own tasks, so a slow `update_knowledge_base` does not
//! hold up reads issued after it. Responses may therefore arrive out of order.

use super::handlers::ToolHandler;
use super::protocol::*;
use super::tools::{all_resources, all_tools};
use crate::state::AppState;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "api-docs-kb";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP server exposing the knowledge base operations as tools.
///
/// Clones share the session, including its initialized flag.
#[derive(Clone)]
pub struct McpServer {
    tool_handler: Arc<ToolHandler>,
    initialized: Arc<AtomicBool>,
}

impl McpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            tool_handler: Arc::new(ToolHandler::new(state)),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Serve on stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        self.run(reader, writer).await
    }

    /// Serve one JSON-RPC message per line until the reader reaches EOF, then wait
    /// for tool calls still running and write their responses.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server starting");
        let mut lines = reader.lines();
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            error!("Failed to read line: {}", e);
                            break;
                        }
                    };

                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!("Received: {}", line);

                    let request = match parse_request(&line) {
                        Ok(request) => request,
                        Err(response) => {
                            write_response(&mut writer, &response).await?;
                            continue;
                        }
                    };

                    if request.method == "tools/call" && request.id.is_some() {
                        let server = self.clone();
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            if let Some(response) = server.handle_request_message(request).await {
                                // Receiver only goes away once run() has returned
                                let _ = tx.send(response);
                            }
                        });
                    } else if let Some(response) = self.handle_request_message(request).await {
                        write_response(&mut writer, &response).await?;
                    }
                }
                Some(response) = rx.recv() => {
                    write_response(&mut writer, &response).await?;
                }
            }
        }

        drop(tx);
        while let Some(response) = rx.recv().await {
            write_response(&mut writer, &response).await?;
        }

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle a single JSON-RPC message. Notifications produce no response.
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        match parse_request(message) {
            Ok(request) => self.handle_request_message(request).await,
            Err(response) => Some(response),
        }
    }

    async fn handle_request_message(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                self.handle_notification(&request);
                return None;
            }
        };

        Some(match self.handle_request(&request).await {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => info!("Client confirmed initialization"),
            "notifications/cancelled" => warn!("Request cancelled by client"),
            _ => debug!("Unknown notification: {}", request.method),
        }
    }

    async fn handle_request(&self, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "resources/list" => self.handle_resources_list(),
            "resources/read" => self.handle_resources_read(&request.params),
            _ => Err(JsonRpcError::method_not_found(&request.method)),
        }
    }

    fn handle_initialize(&self, params: &Option<Value>) -> Result<Value, JsonRpcError> {
        let params: Option<InitializeParams> = parse_params(params)?;

        if let Some(params) = &params {
            info!(
                "Initializing MCP server (client protocol: {})",
                params.protocol_version
            );
            if let Some(client) = &params.client_info {
                info!(
                    "Client: {} v{}",
                    client.name,
                    client.version.as_deref().unwrap_or("unknown")
                );
            }
        }

        self.initialized.store(true, Ordering::SeqCst);

        to_value(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ListChangedCapability { list_changed: false },
                resources: ListChangedCapability { list_changed: false },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        })
    }

    fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        self.require_initialized()?;
        to_value(ToolsListResult { tools: all_tools() })
    }

    async fn handle_tools_call(&self, params: &Option<Value>) -> Result<Value, JsonRpcError> {
        self.require_initialized()?;

        let params: ToolCallParams = parse_params(params)?
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool call params"))?;

        let result = self.tool_handler.call(&params.name, params.arguments).await;
        to_value(result)
    }

    fn handle_resources_list(&self) -> Result<Value, JsonRpcError> {
        self.require_initialized()?;
        to_value(ResourcesListResult {
            resources: all_resources(),
        })
    }

    fn handle_resources_read(&self, params: &Option<Value>) -> Result<Value, JsonRpcError> {
        self.require_initialized()?;

        let params: ReadResourceParams = parse_params(params)?
            .ok_or_else(|| JsonRpcError::invalid_params("Missing resource uri"))?;

        let result = self
            .tool_handler
            .read_resource(&params.uri)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
        to_value(result)
    }

    fn require_initialized(&self) -> Result<(), JsonRpcError> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(JsonRpcError::invalid_request("Server not initialized"))
        }
    }
}

fn parse_request(message: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    serde_json::from_str(message).map_err(|e| {
        JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(e.to_string()))
    })
}

async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)?;
    debug!("Sending: {}", json);
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: &Option<Value>,
) -> Result<Option<T>, JsonRpcError> {
    params
        .as_ref()
        .map(|p| serde_json::from_value(p.clone()))
        .transpose()
        .map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
