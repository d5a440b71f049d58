//! MCP client side: transports, connection pool and tool registry

mod embedded;
mod pool;
mod registry;
mod rmcp_client;
mod transport;
mod types;
mod websocket;

#[cfg(test)]
pub(crate) mod mock;

pub use embedded::EmbeddedTransport;
pub use pool::{ConnectionPool, ServerConnection, ServerStatus};
pub use registry::ToolRegistry;
pub use rmcp_client::RmcpTransport;
pub use transport::{Connector, ToolTransport, TransportConnector, DEFAULT_STARTUP_TIMEOUT};
pub use types::{RawToolOutput, ToolDescriptor, TransportError, TransportKind, TransportSpec};
pub use websocket::WebSocketTransport;
