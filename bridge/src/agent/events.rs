//! Conversation events for real-time visibility
//!
//! Emitted while a conversation runs. The CLI prints them in verbose mode;
//! any other subscriber can consume the same stream.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A conversation is starting
    ConversationStart {
        message: String,
        max_steps: usize,
    },

    /// A step is about to call the provider
    StepStart {
        step: usize,
    },

    /// Tool execution is starting
    ToolStart {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// Tool execution completed
    ToolComplete {
        id: String,
        name: String,
        server: Option<String>,
        /// Result text (truncated for display)
        result: String,
        #[serde(with = "duration_millis")]
        duration: Duration,
        is_error: bool,
    },

    /// A step finished with the given number of tool calls
    StepComplete {
        step: usize,
        tool_calls: usize,
    },

    /// Conversation reached a terminal state
    ResponseComplete {
        content: String,
        steps: usize,
        #[serde(with = "duration_millis")]
        total_duration: Duration,
    },

    Error {
        message: String,
    },
}

/// Serialize Duration as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// ============================================================================
// Event Channel
// ============================================================================

pub type EventSender = mpsc::UnboundedSender<AgentEvent>;

pub type EventReceiver = mpsc::UnboundedReceiver<AgentEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

const MAX_RESULT_PREVIEW: usize = 500;

/// Sends events when a channel is installed, discards them otherwise
#[derive(Clone, Default)]
pub struct AgentEventSender {
    sender: Option<EventSender>,
}

impl AgentEventSender {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn none() -> Self {
        Self { sender: None }
    }

    pub fn is_active(&self) -> bool {
        self.sender.is_some()
    }

    pub fn send(&self, event: AgentEvent) {
        if let Some(ref sender) = self.sender {
            // Receiver may have dropped
            let _ = sender.send(event);
        }
    }

    pub fn conversation_start(&self, message: &str, max_steps: usize) {
        self.send(AgentEvent::ConversationStart {
            message: message.to_string(),
            max_steps,
        });
    }

    pub fn step_start(&self, step: usize) {
        self.send(AgentEvent::StepStart { step });
    }

    pub fn tool_start(&self, id: &str, name: &str, arguments: &serde_json::Value) {
        self.send(AgentEvent::ToolStart {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.clone(),
        });
    }

    pub fn tool_complete(
        &self,
        id: &str,
        name: &str,
        server: Option<&str>,
        result: &str,
        duration: Duration,
        is_error: bool,
    ) {
        self.send(AgentEvent::ToolComplete {
            id: id.to_string(),
            name: name.to_string(),
            server: server.map(str::to_string),
            result: truncate(result, MAX_RESULT_PREVIEW),
            duration,
            is_error,
        });
    }

    pub fn step_complete(&self, step: usize, tool_calls: usize) {
        self.send(AgentEvent::StepComplete { step, tool_calls });
    }

    pub fn response_complete(&self, content: &str, steps: usize, total_duration: Duration) {
        self.send(AgentEvent::ResponseComplete {
            content: content.to_string(),
            steps,
            total_duration,
        });
    }

    pub fn error(&self, message: &str) {
        self.send(AgentEvent::Error {
            message: message.to_string(),
        });
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
