//! Shared fakes: scripted transports, connector and provider

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atelier_bridge::error::ProviderError;
use atelier_bridge::llm::{ProviderAdapter, ProviderResponse, ToolRequest, TurnContext};
use atelier_bridge::mcp::{
    Connector, RawToolOutput, ToolDescriptor, ToolRegistry, ToolTransport, TransportError,
    TransportKind, TransportSpec,
};
use atelier_bridge::agent::ToolCall;
use serde_json::{json, Value};

/// Transport whose tools reply "success", except `fail`, which errors
pub struct FakeTransport {
    tools: Vec<String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolTransport for FakeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::StdioProcess
    }

    async fn list_tools(&self, server: &str) -> Result<Vec<ToolDescriptor>, TransportError> {
        Ok(self
            .tools
            .iter()
            .map(|name| ToolDescriptor::new(server, name.clone(), format!("{} on {}", name, server), json!({"type": "object"})))
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<RawToolOutput, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = arguments.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        match name {
            "fail" => Err(TransportError::Server("backend unavailable".to_string())),
            _ => Ok(RawToolOutput::text("success")),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Hands out [`FakeTransport`]s for known server names and refuses the rest
#[derive(Default)]
pub struct FakeConnector {
    servers: HashMap<String, Vec<String>>,
    pub connects: AtomicUsize,
    pub calls: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn with_server(mut self, name: &str, tools: &[&str]) -> Self {
        self.servers
            .insert(name.to_string(), tools.iter().map(|t| t.to_string()).collect());
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        server: &str,
        _spec: &TransportSpec,
    ) -> Result<Box<dyn ToolTransport>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let tools = self
            .servers
            .get(server)
            .cloned()
            .ok_or_else(|| TransportError::ConnectionFailed(format!("no route to {}", server)))?;
        Ok(Box::new(FakeTransport {
            tools,
            calls: self.calls.clone(),
        }))
    }
}

/// Provider replaying canned responses; records every context it receives
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    pub contexts: Arc<Mutex<Vec<TurnContext>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            contexts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub fn text_reply(text: &str) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse {
        text: text.to_string(),
        tool_requests: Vec::new(),
        stop_reason: Some("end_turn".to_string()),
    })
}

pub fn tool_reply(calls: &[(&str, &str, Value)]) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse {
        text: String::new(),
        tool_requests: calls
            .iter()
            .map(|(id, name, args)| ToolRequest::Call(ToolCall::new(*id, *name, args.clone())))
            .collect(),
        stop_reason: Some("tool_use".to_string()),
    })
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    fn build_tool_declarations(&self, registry: &ToolRegistry) -> Vec<Value> {
        registry.all().iter().map(|tool| json!({"name": tool.name})).collect()
    }

    async fn send_turn(
        &self,
        context: &TurnContext,
        _declarations: &[Value],
    ) -> Result<ProviderResponse, ProviderError> {
        self.contexts.lock().unwrap().push(context.clone());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| tool_reply(&[("again", "tool1", json!({}))]))
    }

    fn parse_tool_requests(&self, _raw: &Value) -> Vec<ToolRequest> {
        Vec::new()
    }
}
