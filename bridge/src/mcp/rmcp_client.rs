//! rmcp-backed transports: stdio child processes and streamable HTTP

use std::collections::HashMap;

use async_trait::async_trait;
use rmcp::{
    model::CallToolRequestParam,
    service::{Peer, RunningService},
    transport::{StreamableHttpClientTransport, TokioChildProcess},
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::transport::ToolTransport;
use super::types::{RawToolOutput, ToolDescriptor, TransportError, TransportKind};

/// Persistent rmcp client session
///
/// Requests go through a cloned [`Peer`], so concurrent calls never wait on
/// the service lock; the lock is only taken to shut the session down.
pub struct RmcpTransport {
    kind: TransportKind,
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl RmcpTransport {
    /// Spawn a child process and speak MCP over its stdio
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, TransportError> {
        let mut cmd = Command::new(command);
        if !args.is_empty() {
            cmd.args(args);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self::from_service(TransportKind::StdioProcess, service))
    }

    /// Connect to a streamable HTTP endpoint
    pub async fn streamable_http(url: &str) -> Result<Self, TransportError> {
        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self::from_service(TransportKind::HttpStream, service))
    }

    fn from_service(kind: TransportKind, service: RunningService<RoleClient, ()>) -> Self {
        if let Some(info) = service.peer().peer_info() {
            tracing::debug!("Connected to {} ({})", info.server_info.name, kind);
        }
        Self {
            kind,
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        }
    }
}

#[async_trait]
impl ToolTransport for RmcpTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn list_tools(&self, server: &str) -> Result<Vec<ToolDescriptor>, TransportError> {
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| TransportError::Server(e.to_string()))?;

        Ok(tools
            .into_iter()
            .map(|tool| ToolDescriptor::from_mcp(server, tool))
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<RawToolOutput, TransportError> {
        let result = self
            .peer
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
                task: None,
            })
            .await
            .map_err(|e| TransportError::Server(e.to_string()))?;

        Ok(result.into())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Some(service) = self.service.lock().await.take() {
            service
                .cancel()
                .await
                .map_err(|e| TransportError::Server(e.to_string()))?;
        }
        Ok(())
    }
}
