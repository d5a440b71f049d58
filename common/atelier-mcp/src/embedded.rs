//! In-process MCP servers
//!
//! An [`EmbeddedServer`] is driven directly by the bridge: no child process,
//! no socket. Mock application servers and servers running on a background
//! task use this to join a connection pool next to stdio and network servers.

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;

/// Errors raised by an embedded server
#[derive(Debug, thiserror::Error)]
pub enum EmbeddedError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("tool execution failed: {0}")]
    ExecutionError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("mcp error: {0}")]
    McpError(String),
}

impl From<rmcp::ErrorData> for EmbeddedError {
    fn from(err: rmcp::ErrorData) -> Self {
        EmbeddedError::McpError(err.message.to_string())
    }
}

pub type EmbeddedResult<T> = Result<T, EmbeddedError>;

/// A tool server that can be called without a transport
///
/// Implementations must be `Send + Sync`: the bridge issues concurrent
/// tool calls against the same server.
#[async_trait]
pub trait EmbeddedServer: Send + Sync {
    /// Name used as the server key in the connection pool
    fn server_name(&self) -> &str;

    /// All tools this server exposes
    fn list_tools(&self) -> Vec<Tool>;

    /// Execute a tool with a JSON object of arguments
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddedResult<CallToolResult>;

    fn server_description(&self) -> Option<&str> {
        None
    }
}
