//! Tool call and result types shared by the dispatcher, the conversation and
//! the provider adapters

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::events::duration_millis;

/// An outbound tool request
///
/// The owning server is not part of the call; it is resolved through the
/// registry when the call is dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-supplied or generated id, echoed on the result
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Terminal payload of a [`ToolResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Value(Value),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolResultState {
    Pending,
    Succeeded,
    Failed,
}

/// Outcome of one dispatched [`ToolCall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
    /// Server that handled the call, when it was resolved
    pub server_name: Option<String>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    outcome: Option<ToolOutcome>,
}

impl ToolResult {
    /// Result that has not been finalized yet
    pub fn pending(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            arguments: call.arguments.clone(),
            server_name: None,
            duration: Duration::ZERO,
            outcome: None,
        }
    }

    /// Finalize with an outcome; a result that already has one is returned unchanged
    pub fn finish(mut self, outcome: ToolOutcome, duration: Duration) -> Self {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
            self.duration = duration;
        }
        self
    }

    pub(crate) fn with_server(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    /// Shorthand for a result that failed before reaching any server
    pub fn failed(call: &ToolCall, message: impl Into<String>) -> Self {
        Self::pending(call).finish(ToolOutcome::Error(message.into()), Duration::ZERO)
    }

    pub fn outcome(&self) -> Option<&ToolOutcome> {
        self.outcome.as_ref()
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.outcome {
            Some(ToolOutcome::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Some(ToolOutcome::Error(message)) => Some(message),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    pub fn state(&self) -> ToolResultState {
        match self.outcome {
            None => ToolResultState::Pending,
            Some(ToolOutcome::Value(_)) => ToolResultState::Succeeded,
            Some(ToolOutcome::Error(_)) => ToolResultState::Failed,
        }
    }

    /// Result as the text fed back to the model
    pub fn content_text(&self) -> String {
        match &self.outcome {
            Some(ToolOutcome::Value(Value::String(text))) => text.clone(),
            Some(ToolOutcome::Value(value)) => value.to_string(),
            Some(ToolOutcome::Error(message)) => format!("Error: {}", message),
            None => String::new(),
        }
    }
}
