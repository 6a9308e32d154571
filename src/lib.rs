//! API docs knowledge base - vendor API documentation served to AI agents
//!
//! This library exposes the knowledge base store, its query engine and refresh
//! scheduler, and the HTTP and MCP surfaces built on top of them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod knowledge;
pub mod mcp;
pub mod persistence;
pub mod refresh;
pub mod source;
pub mod state;

// Re-export key types for convenience
pub use config::Config;
pub use error::{AppError, Result};
pub use knowledge::{KnowledgeStore, MethodRecord, ParameterSpec, QueryEngine};
pub use refresh::RefreshScheduler;
pub use source::DocumentSource;
pub use state::AppState;
