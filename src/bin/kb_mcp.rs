//! MCP stdio server for the API docs knowledge base.
//!
//! Configuration comes from the same environment variables as the HTTP service.

use api_docs_kb::mcp::McpServer;
use api_docs_kb::{AppState, Config};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr to keep stdout clean for MCP
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "api_docs_kb=info".into()))
        .init();

    let config = Config::from_env()?;
    info!(
        docs_file = %config.docs_file.display(),
        docs_url = config.docs_url.as_deref().unwrap_or("-"),
        "Starting MCP server for the API docs knowledge base"
    );

    let state = Arc::new(AppState::new(config));

    let scheduler_task = state.start_scheduler();

    let server = McpServer::new(Arc::clone(&state));
    let result = server.run_stdio().await;

    // stdin closed: stop refreshing and exit
    state.scheduler.shutdown();
    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Refresh scheduler task ended abnormally");
    }

    result
}
