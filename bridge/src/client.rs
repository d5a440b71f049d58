//! Client facade
//!
//! Owns the connection pool and the tool registry and hands both to a
//! [`ConversationEngine`] for each `chat` call. One conversation at a time:
//! callers that need concurrent conversations use separate clients.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use atelier_mcp::EmbeddedServer;
use serde_json::Value;

use crate::agent::{
    AgentEventSender, ConversationEngine, ConversationState, EventSender, ToolCall, ToolDispatcher,
    ToolResult, DEFAULT_TOOL_TIMEOUT,
};
use crate::config::{AtelierConfig, McpServerConfig};
use crate::error::BridgeResult;
use crate::llm::{adapter_from_config, ProviderAdapter};
use crate::mcp::{
    ConnectionPool, EmbeddedTransport, ServerStatus, ToolDescriptor, ToolRegistry, ToolTransport,
};

pub struct BridgeClient {
    provider: Box<dyn ProviderAdapter>,
    pool: ConnectionPool,
    registry: ToolRegistry,
    system_prompt: Option<String>,
    snapshot: Option<Value>,
    tool_timeout: Duration,
    events: AgentEventSender,
}

impl BridgeClient {
    /// Assemble a client from its parts
    pub fn new(provider: Box<dyn ProviderAdapter>, pool: ConnectionPool, registry: ToolRegistry) -> Self {
        Self {
            provider,
            pool,
            registry,
            system_prompt: None,
            snapshot: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            events: AgentEventSender::none(),
        }
    }

    /// Build from settings, reading the provider API key from the environment
    ///
    /// A missing key fails here, before any server is contacted.
    pub fn from_config(config: &AtelierConfig) -> BridgeResult<Self> {
        let provider = adapter_from_config(&config.llm)?;
        let pool = ConnectionPool::new().with_startup_timeout(config.agent.startup_timeout());

        let mut client = Self::new(provider, pool, ToolRegistry::new())
            .with_tool_timeout(config.agent.tool_timeout());
        client.system_prompt = config.agent.system_prompt.clone();
        Ok(client)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = AgentEventSender::new(sender);
        self
    }

    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.system_prompt = prompt;
    }

    /// Application state appended to the system preamble; `None` clears it
    pub fn set_context_snapshot(&mut self, snapshot: Option<Value>) {
        self.snapshot = snapshot;
    }

    pub fn provider(&self) -> &dyn ProviderAdapter {
        self.provider.as_ref()
    }

    /// Connect every configured server and register the tools of those that came up
    pub async fn connect(
        &mut self,
        configs: &BTreeMap<String, McpServerConfig>,
    ) -> BTreeMap<String, bool> {
        let outcome = self.pool.connect_all(configs).await;

        for (name, connected) in &outcome {
            if !*connected {
                continue;
            }
            if let Some(connection) = self.pool.connection(name) {
                self.registry.refresh(name, connection.tools().to_vec());
            }
        }

        let up = outcome.values().filter(|ok| **ok).count();
        tracing::info!(
            "Connected {}/{} servers, {} tools available",
            up,
            outcome.len(),
            self.registry.len()
        );
        outcome
    }

    /// Attach an already-built transport; returns its tool count
    pub async fn attach(&mut self, name: &str, transport: Box<dyn ToolTransport>) -> BridgeResult<usize> {
        let tools = self.pool.attach(name, transport).await?.tools().to_vec();
        let count = tools.len();
        self.registry.refresh(name, tools);
        Ok(count)
    }

    /// Attach an in-process server
    pub async fn attach_embedded(
        &mut self,
        name: &str,
        server: Arc<dyn EmbeddedServer>,
    ) -> BridgeResult<usize> {
        self.attach(name, Box::new(EmbeddedTransport::new(server))).await
    }

    /// Run one conversation to a terminal state
    pub async fn chat(&self, user_message: &str, max_steps: usize) -> ConversationState {
        ConversationEngine::new(self.provider.as_ref(), &self.registry, &self.pool)
            .with_system_prompt(self.system_prompt.as_deref())
            .with_snapshot(self.snapshot.as_ref())
            .with_tool_timeout(self.tool_timeout)
            .with_events(self.events.clone())
            .run(user_message, max_steps)
            .await
    }

    /// Dispatch a single tool call without involving the provider
    pub async fn call_tool(&self, call: &ToolCall) -> ToolResult {
        ToolDispatcher::new(&self.registry, &self.pool)
            .with_timeout(self.tool_timeout)
            .dispatch_one(call)
            .await
    }

    pub fn list_tools_by_server(&self) -> BTreeMap<String, Vec<String>> {
        self.registry.grouped_by_server()
    }

    pub fn tools(&self) -> Vec<&ToolDescriptor> {
        self.registry.all()
    }

    pub fn connected_servers(&self) -> Vec<String> {
        self.pool.connected_servers()
    }

    pub fn is_connected(&self, server_name: &str) -> bool {
        self.pool.is_connected(server_name)
    }

    pub fn find_owning_server(&self, tool_name: &str) -> Option<&str> {
        self.registry.owner_of(tool_name)
    }

    pub fn status(&self) -> Vec<ServerStatus> {
        self.pool.status()
    }

    /// Close one server and forget its tools
    pub async fn disconnect_server(&mut self, name: &str) -> bool {
        self.registry.remove(name);
        self.pool.disconnect(name).await
    }

    /// Close every server and clear the registry
    pub async fn disconnect(&mut self) {
        self.pool.disconnect_all().await;
        self.registry.clear();
    }
}
