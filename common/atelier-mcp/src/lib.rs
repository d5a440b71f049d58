//! Shared utilities for atelier MCP servers
//!
//! - **Embedded servers**: [`EmbeddedServer`] lets a server run inside the
//!   bridge process instead of behind a transport
//! - **Results**: helpers for building `CallToolResult` responses
//! - **Startup**: [`init_tracing`] and the `serve_stdio!` macro
//!
//! ```rust,ignore
//! use atelier_mcp::{serve_stdio, json_success};
//!
//! serve_stdio!(MySceneServer, "my_scene_mcp");
//!
//! fn get_scene(&self) -> Result<CallToolResult, McpError> {
//!     json_success(&self.scene)
//! }
//! ```

pub mod embedded;
pub mod init;
pub mod result;

pub use embedded::{EmbeddedError, EmbeddedResult, EmbeddedServer};
pub use init::init_tracing;
pub use result::{error_text, json_success, text_success};

pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};

pub use async_trait::async_trait;
