//! In-process servers attached to the pool

use std::sync::Arc;

use async_trait::async_trait;
use atelier_mcp::{EmbeddedError, EmbeddedServer};
use serde_json::Value;

use super::transport::ToolTransport;
use super::types::{RawToolOutput, ToolDescriptor, TransportError, TransportKind};

/// Adapts an [`EmbeddedServer`] to the transport interface
pub struct EmbeddedTransport {
    server: Arc<dyn EmbeddedServer>,
}

impl EmbeddedTransport {
    pub fn new(server: Arc<dyn EmbeddedServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl ToolTransport for EmbeddedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Embedded
    }

    async fn list_tools(&self, server: &str) -> Result<Vec<ToolDescriptor>, TransportError> {
        Ok(self
            .server
            .list_tools()
            .into_iter()
            .map(|tool| ToolDescriptor::from_mcp(server, tool))
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<RawToolOutput, TransportError> {
        match self.server.call_tool(name, arguments).await {
            Ok(result) => Ok(result.into()),
            // Argument and lookup failures are the tool's answer, not a broken channel
            Err(
                e @ (EmbeddedError::InvalidParams(_)
                | EmbeddedError::SerdeError(_)
                | EmbeddedError::ToolNotFound(_)
                | EmbeddedError::ExecutionError(_)),
            ) => Ok(RawToolOutput::error(e.to_string())),
            Err(e) => Err(TransportError::Server(e.to_string())),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
