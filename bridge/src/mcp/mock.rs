//! Scripted transports for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::transport::{Connector, ToolTransport};
use super::types::{RawToolOutput, ToolDescriptor, TransportError, TransportKind, TransportSpec};

/// Transport whose tools answer by name:
///
/// - `fail`: transport error
/// - `app_error`: output flagged as an error
/// - `empty`: no content at all
/// - `json_text`: a JSON document as text
/// - `structured`: structured content
/// - anything else: echoes `arguments.reply`, or "success"
///
/// An integer `delay_ms` argument delays the reply.
pub(crate) struct MockTransport {
    tools: Vec<String>,
    list_fails: bool,
    close_fails: bool,
    calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub(crate) fn new(tools: &[&str]) -> Self {
        Self {
            tools: tools.iter().map(|t| t.to_string()).collect(),
            list_fails: false,
            close_fails: false,
            calls: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub(crate) fn failing_listing(mut self) -> Self {
        self.list_fails = true;
        self
    }

    pub(crate) fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub(crate) fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl ToolTransport for MockTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::StdioProcess
    }

    async fn list_tools(&self, server: &str) -> Result<Vec<ToolDescriptor>, TransportError> {
        if self.list_fails {
            return Err(TransportError::Protocol("tools/list rejected".to_string()));
        }
        Ok(self
            .tools
            .iter()
            .map(|name| {
                ToolDescriptor::new(
                    server,
                    name.clone(),
                    format!("{} tool", name),
                    json!({"type": "object", "properties": {}}),
                )
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<RawToolOutput, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = arguments.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        match name {
            "fail" => Err(TransportError::Server("tool exploded".to_string())),
            "app_error" => Ok(RawToolOutput::error("layer is locked")),
            "empty" => Ok(RawToolOutput::default()),
            "json_text" => Ok(RawToolOutput::text(r#"{"count": 2}"#)),
            "structured" => Ok(RawToolOutput::structured(json!({"ok": true}))),
            _ => Ok(RawToolOutput::text(
                arguments
                    .get("reply")
                    .and_then(Value::as_str)
                    .unwrap_or("success"),
            )),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.close_fails {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

/// Connector that hands out [`MockTransport`]s per server name
#[derive(Default)]
pub(crate) struct MockConnector {
    servers: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    broken_listing: HashSet<String>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_server(mut self, name: &str, tools: &[&str]) -> Self {
        self.servers
            .insert(name.to_string(), tools.iter().map(|t| t.to_string()).collect());
        self
    }

    pub(crate) fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub(crate) fn with_broken_listing(mut self, name: &str) -> Self {
        self.broken_listing.insert(name.to_string());
        self
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        server: &str,
        _spec: &TransportSpec,
    ) -> Result<Box<dyn ToolTransport>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(server) {
            return Err(TransportError::ConnectionFailed(format!("{} refused", server)));
        }

        let tools = self.servers.get(server).cloned().unwrap_or_default();
        let names: Vec<&str> = tools.iter().map(String::as_str).collect();
        let mut transport = MockTransport::new(&names);
        if self.broken_listing.contains(server) {
            transport = transport.failing_listing();
        }
        Ok(Box::new(transport))
    }
}
