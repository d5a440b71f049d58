//! Tool call dispatch
//!
//! Routes each call to the server that owns the tool and normalizes whatever
//! comes back into a [`ToolResult`]. Nothing here returns an error: unknown
//! tools, transport failures, timeouts and tool-reported errors all become
//! failed results so the model can see them.

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::Value;

use super::types::{ToolCall, ToolOutcome, ToolResult};
use crate::error::BridgeError;
use crate::mcp::{ConnectionPool, RawToolOutput, ToolRegistry, TransportError};

/// Default wall-clock bound for one tool call
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

const NO_RESULT: &str = "No result returned";

pub struct ToolDispatcher<'a> {
    registry: &'a ToolRegistry,
    pool: &'a ConnectionPool,
    tool_timeout: Duration,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(registry: &'a ToolRegistry, pool: &'a ConnectionPool) -> Self {
        Self {
            registry,
            pool,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, tool_timeout: Duration) -> Self {
        self.tool_timeout = tool_timeout;
        self
    }

    /// Execute one call against its owning server
    pub async fn dispatch_one(&self, call: &ToolCall) -> ToolResult {
        let result = ToolResult::pending(call);

        let Some(descriptor) = self.registry.resolve(&call.tool_name) else {
            tracing::debug!("Tool '{}' is not registered", call.tool_name);
            let message = BridgeError::ToolNotFound(call.tool_name.clone()).to_string();
            return result.finish(ToolOutcome::Error(message), Duration::ZERO);
        };
        let server = descriptor.owning_server.as_str();

        tracing::debug!("Calling {} on '{}' (id {})", call.tool_name, server, call.id);
        let started = Instant::now();
        let response = tokio::time::timeout(
            self.tool_timeout,
            self.pool.call_tool(server, &call.tool_name, call.arguments.clone()),
        )
        .await
        .unwrap_or(Err(TransportError::Timeout(self.tool_timeout)));
        let elapsed = started.elapsed();

        let outcome = match response {
            Ok(raw) => normalize(raw),
            Err(e) => {
                tracing::warn!("Tool {} on '{}' failed: {}", call.tool_name, server, e);
                ToolOutcome::Error(
                    BridgeError::ToolExecution {
                        tool: call.tool_name.clone(),
                        message: e.to_string(),
                    }
                    .to_string(),
                )
            }
        };

        result.with_server(server).finish(outcome, elapsed)
    }

    /// Execute all calls concurrently; results come back in call order
    pub async fn dispatch_many(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.dispatch_one(call))).await
    }
}

/// Collapse raw tool output into a value or an error
///
/// Structured content wins; otherwise text that holds a JSON object or array
/// is decoded, and any other text is kept as a string.
pub(crate) fn normalize(raw: RawToolOutput) -> ToolOutcome {
    let text = raw.joined_text();

    if raw.is_error {
        let message = if text.trim().is_empty() {
            "Tool reported an error".to_string()
        } else {
            text
        };
        return ToolOutcome::Error(message);
    }

    if let Some(structured) = raw.structured {
        return ToolOutcome::Value(structured);
    }

    if text.trim().is_empty() {
        return ToolOutcome::Error(NO_RESULT.to_string());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(decoded @ (Value::Object(_) | Value::Array(_))) => ToolOutcome::Value(decoded),
        _ => ToolOutcome::Value(Value::String(text)),
    }
}
