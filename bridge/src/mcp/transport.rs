//! Transport abstraction
//!
//! Every backend, whatever it speaks on the wire, is reached through a
//! [`ToolTransport`]. A [`Connector`] turns a validated [`TransportSpec`] into
//! a live transport; the pool never touches sockets or processes itself.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::rmcp_client::RmcpTransport;
use super::types::{RawToolOutput, ToolDescriptor, TransportError, TransportKind, TransportSpec};
use super::websocket::WebSocketTransport;

/// Default startup timeout for connecting to a server and listing its tools
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// A live channel to one server
///
/// Methods take `&self`: the dispatcher issues concurrent calls against the
/// same server.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Fetch the server's tools, attributed to `server`
    async fn list_tools(&self, server: &str) -> Result<Vec<ToolDescriptor>, TransportError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<RawToolOutput, TransportError>;

    /// Release the underlying process or socket
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds transports from resolved specs
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        server: &str,
        spec: &TransportSpec,
    ) -> Result<Box<dyn ToolTransport>, TransportError>;
}

/// Connector for real stdio, HTTP and WebSocket servers
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportConnector;

#[async_trait]
impl Connector for TransportConnector {
    async fn connect(
        &self,
        server: &str,
        spec: &TransportSpec,
    ) -> Result<Box<dyn ToolTransport>, TransportError> {
        tracing::debug!("Connecting to MCP server '{}' over {}", server, spec.kind());

        match spec {
            TransportSpec::Stdio { command, args, env } => {
                let transport = RmcpTransport::spawn(command, args, env).await?;
                Ok(Box::new(transport))
            }
            TransportSpec::Http { url } => {
                let transport = RmcpTransport::streamable_http(url).await?;
                Ok(Box::new(transport))
            }
            TransportSpec::WebSocket { url } => {
                let transport = WebSocketTransport::connect(url).await?;
                Ok(Box::new(transport))
            }
        }
    }
}
