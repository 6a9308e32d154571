//! MCP (Model Context Protocol) server
//!
//! Exposes the knowledge base operations as tools for AI agents over stdio.

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod tools;

pub use handlers::ToolHandler;
pub use protocol::*;
pub use server::McpServer;
