//! Connection pool
//!
//! One logical connection per configured server. Connection attempts run
//! concurrently and fail independently: a bad entry or an unreachable
//! server only ever costs that one server.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;

use super::transport::{Connector, ToolTransport, TransportConnector, DEFAULT_STARTUP_TIMEOUT};
use super::types::{RawToolOutput, ToolDescriptor, TransportError, TransportKind};
use crate::config::McpServerConfig;
use crate::error::{BridgeError, BridgeResult};

/// A live channel to one server
pub struct ServerConnection {
    server_name: String,
    transport: Box<dyn ToolTransport>,
    tools: Vec<ToolDescriptor>,
}

impl ServerConnection {
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Tools fetched when the connection was established
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<RawToolOutput, TransportError> {
        self.transport.call_tool(tool_name, arguments).await
    }

    async fn close(self) -> Result<(), TransportError> {
        self.transport.close().await
    }
}

/// Connection summary for status output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub kind: TransportKind,
    pub tool_count: usize,
}

pub struct ConnectionPool {
    connections: BTreeMap<String, ServerConnection>,
    connector: Arc<dyn Connector>,
    startup_timeout: Duration,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionPool {
    /// Pool that connects to real stdio, HTTP and WebSocket servers
    pub fn new() -> Self {
        Self::with_connector(Arc::new(TransportConnector))
    }

    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connections: BTreeMap::new(),
            connector,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Bound on connect + initial tool listing, per server
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Connect to every configured server concurrently
    ///
    /// Returns per-server success. Failures are logged and leave no trace in
    /// the pool; a server that was already connected keeps its previous
    /// connection if the new attempt fails, and is replaced if it succeeds.
    pub async fn connect_all(
        &mut self,
        configs: &BTreeMap<String, McpServerConfig>,
    ) -> BTreeMap<String, bool> {
        let connector = self.connector.clone();
        let startup_timeout = self.startup_timeout;

        let attempts = configs.iter().map(|(name, config)| {
            let connector = connector.clone();
            async move {
                let result = establish(connector.as_ref(), name, config, startup_timeout).await;
                (name.clone(), result)
            }
        });
        let results = join_all(attempts).await;

        let mut outcome = BTreeMap::new();
        for (name, result) in results {
            match result {
                Ok(connection) => {
                    tracing::info!(
                        "Server '{}': connected over {} ({} tools)",
                        name,
                        connection.transport_kind(),
                        connection.tools.len()
                    );
                    if let Some(previous) = self.connections.insert(name.clone(), connection) {
                        if let Err(e) = previous.close().await {
                            tracing::warn!("Failed to close replaced connection '{}': {}", name, e);
                        }
                    }
                    outcome.insert(name, true);
                }
                Err(e) => {
                    tracing::warn!("Server '{}': {}", name, e);
                    outcome.insert(name, false);
                }
            }
        }
        outcome
    }

    /// Register an already-built transport (e.g. an embedded server)
    pub async fn attach(
        &mut self,
        name: &str,
        transport: Box<dyn ToolTransport>,
    ) -> BridgeResult<&ServerConnection> {
        let tools = match transport.list_tools(name).await {
            Ok(tools) => tools,
            Err(e) => {
                transport.close().await.ok();
                return Err(connection_error(name, e));
            }
        };

        let connection = ServerConnection {
            server_name: name.to_string(),
            transport,
            tools,
        };
        if let Some(previous) = self.connections.insert(name.to_string(), connection) {
            previous.close().await.ok();
        }
        self.connections
            .get(name)
            .ok_or_else(|| BridgeError::Connection {
                server: name.to_string(),
                message: "connection vanished after attach".to_string(),
            })
    }

    /// Close one server; returns whether it was connected
    pub async fn disconnect(&mut self, name: &str) -> bool {
        match self.connections.remove(name) {
            Some(connection) => {
                if let Err(e) = connection.close().await {
                    tracing::warn!("Error closing '{}': {}", name, e);
                }
                true
            }
            None => false,
        }
    }

    /// Close every connection, best-effort
    pub async fn disconnect_all(&mut self) {
        for (name, connection) in std::mem::take(&mut self.connections) {
            if let Err(e) = connection.close().await {
                tracing::warn!("Error closing '{}': {}", name, e);
            }
        }
    }

    pub fn is_connected(&self, server_name: &str) -> bool {
        self.connections.contains_key(server_name)
    }

    pub fn connection(&self, server_name: &str) -> Option<&ServerConnection> {
        self.connections.get(server_name)
    }

    pub fn connections(&self) -> impl Iterator<Item = &ServerConnection> {
        self.connections.values()
    }

    pub fn connected_servers(&self) -> Vec<String> {
        self.connections.keys().cloned().collect()
    }

    pub fn status(&self) -> Vec<ServerStatus> {
        self.connections
            .values()
            .map(|connection| ServerStatus {
                name: connection.server_name.clone(),
                kind: connection.transport_kind(),
                tool_count: connection.tools.len(),
            })
            .collect()
    }

    /// Invoke a tool on a specific server
    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<RawToolOutput, TransportError> {
        match self.connections.get(server_name) {
            Some(connection) => connection.call_tool(tool_name, arguments).await,
            None => Err(TransportError::NotConnected),
        }
    }
}

/// Resolve, connect and list tools for one server
async fn establish(
    connector: &dyn Connector,
    name: &str,
    config: &McpServerConfig,
    startup_timeout: Duration,
) -> BridgeResult<ServerConnection> {
    let spec = config.resolve()?;

    let attempt = async {
        let transport = connector.connect(name, &spec).await?;
        match transport.list_tools(name).await {
            Ok(tools) => Ok((transport, tools)),
            Err(e) => {
                transport.close().await.ok();
                Err(e)
            }
        }
    };

    let (transport, tools) = tokio::time::timeout(startup_timeout, attempt)
        .await
        .map_err(|_| connection_error(name, TransportError::Timeout(startup_timeout)))?
        .map_err(|e| connection_error(name, e))?;

    Ok(ServerConnection {
        server_name: name.to_string(),
        transport,
        tools,
    })
}

fn connection_error(server: &str, error: TransportError) -> BridgeError {
    BridgeError::Connection {
        server: server.to_string(),
        message: error.to_string(),
    }
}
