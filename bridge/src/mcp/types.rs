//! MCP type definitions
//!
//! Shared types used across transports, the registry and the pool.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use rmcp::model::{CallToolResult, RawContent, Tool};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A tool exposed by one connected server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Tool name (flat global namespace across servers)
    pub name: String,
    pub description: String,
    /// JSON schema for the arguments, provider-agnostic
    pub input_schema: Value,
    /// Server this tool belongs to
    pub owning_server: String,
}

impl ToolDescriptor {
    pub fn new(
        owning_server: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            owning_server: owning_server.into(),
        }
    }

    /// Convert an rmcp tool listing entry
    pub fn from_mcp(server: &str, tool: Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
            input_schema: Value::Object(tool.input_schema.as_ref().clone()),
            owning_server: server.to_string(),
        }
    }
}

/// How a server is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    StdioProcess,
    HttpStream,
    WebSocket,
    /// In-process server attached directly to the pool
    Embedded,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::StdioProcess => "stdio",
            TransportKind::HttpStream => "http",
            TransportKind::WebSocket => "websocket",
            TransportKind::Embedded => "embedded",
        };
        f.write_str(name)
    }
}

/// A validated server entry, ready to connect
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSpec {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    Http {
        url: String,
    },
    WebSocket {
        url: String,
    },
}

impl TransportSpec {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportSpec::Stdio { .. } => TransportKind::StdioProcess,
            TransportSpec::Http { .. } => TransportKind::HttpStream,
            TransportSpec::WebSocket { .. } => TransportKind::WebSocket,
        }
    }
}

/// Tool output as returned by a transport, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawToolOutput {
    /// Already-structured payload, when the server sent one
    pub structured: Option<Value>,
    /// Text content blocks in order
    pub text: Vec<String>,
    /// Server flagged the call as failed
    pub is_error: bool,
}

impl RawToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: vec![text.into()],
            ..Default::default()
        }
    }

    pub fn structured(value: Value) -> Self {
        Self {
            structured: Some(value),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: vec![message.into()],
            is_error: true,
            ..Default::default()
        }
    }

    /// Text blocks joined by newlines
    pub fn joined_text(&self) -> String {
        self.text.join("\n")
    }
}

impl From<CallToolResult> for RawToolOutput {
    fn from(result: CallToolResult) -> Self {
        let text = result
            .content
            .iter()
            .map(|content| match &content.raw {
                RawContent::Text(text) => text.text.clone(),
                other => serde_json::to_string(other).unwrap_or_default(),
            })
            .collect();

        Self {
            structured: result.structured_content,
            text,
            is_error: result.is_error.unwrap_or(false),
        }
    }
}

/// Transport-level failures for a single server
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("not connected")]
    NotConnected,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::Content;

    #[test]
    fn test_raw_output_from_call_result() {
        let result = CallToolResult::success(vec![Content::text("line one"), Content::text("two")]);
        let raw = RawToolOutput::from(result);
        assert_eq!(raw.joined_text(), "line one\ntwo");
        assert!(!raw.is_error);
        assert!(raw.structured.is_none());
    }

    #[test]
    fn test_raw_output_keeps_error_flag() {
        let raw = RawToolOutput::from(CallToolResult::error(vec![Content::text("boom")]));
        assert!(raw.is_error);
        assert_eq!(raw.joined_text(), "boom");
    }

    #[test]
    fn test_spec_kind() {
        let spec = TransportSpec::WebSocket {
            url: "ws://localhost:3001".to_string(),
        };
        assert_eq!(spec.kind(), TransportKind::WebSocket);
        assert_eq!(spec.kind().to_string(), "websocket");
    }
}
