//! Conversation state
//!
//! A [`ConversationState`] lives for one `chat` call. Steps are append-only
//! and the step count never exceeds `max_steps`.

use std::collections::HashSet;

use super::types::{ToolCall, ToolResult};
use crate::error::{BridgeError, BridgeResult, ProviderError};
use crate::llm::Message;

/// One provider turn and the tool calls it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Zero-based, monotonic
    pub step_number: usize,
    pub assistant_text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    /// Provider failure that ended the conversation at this step
    pub error: Option<ProviderError>,
}

impl Step {
    pub fn new(step_number: usize) -> Self {
        Self {
            step_number,
            assistant_text: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            error: None,
        }
    }

    /// Calls without a finalized result, matched by id
    pub fn pending_calls(&self) -> Vec<&ToolCall> {
        let answered: HashSet<&str> = self
            .tool_results
            .iter()
            .filter(|result| result.outcome().is_some())
            .map(|result| result.id.as_str())
            .collect();
        self.tool_calls
            .iter()
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect()
    }

    pub fn has_pending_calls(&self) -> bool {
        !self.pending_calls().is_empty()
    }
}

/// Why a conversation stopped
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalReason {
    /// The model answered without requesting tools
    Completed,
    /// `max_steps` steps were used
    StepLimit,
    ProviderFailed(ProviderError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    user_message: String,
    steps: Vec<Step>,
    current_step_index: usize,
    max_steps: usize,
    terminal: Option<TerminalReason>,
}

impl ConversationState {
    pub fn new(user_message: impl Into<String>, max_steps: usize) -> Self {
        Self {
            user_message: user_message.into(),
            steps: Vec::new(),
            current_step_index: 0,
            max_steps,
            terminal: (max_steps == 0).then_some(TerminalReason::StepLimit),
        }
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Index of the most recent step
    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Number the next step will get
    pub fn next_step_number(&self) -> usize {
        self.steps.len()
    }

    /// Whether another step may be started
    pub fn can_continue(&self) -> bool {
        self.terminal.is_none() && self.steps.len() < self.max_steps
    }

    /// Append a completed step
    ///
    /// Ignored once the conversation is terminal or the ceiling is reached.
    pub fn record_step(&mut self, step: Step) -> bool {
        if !self.can_continue() {
            tracing::warn!("Dropping step {}: conversation cannot continue", step.step_number);
            return false;
        }
        self.current_step_index = self.steps.len();
        self.steps.push(Step {
            step_number: self.current_step_index,
            ..step
        });
        true
    }

    /// Mark terminal; the first reason recorded sticks
    pub fn finish(&mut self, reason: TerminalReason) {
        if self.terminal.is_none() {
            self.terminal = Some(reason);
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn terminal_reason(&self) -> Option<&TerminalReason> {
        self.terminal.as_ref()
    }

    /// Text of the last step, if it has any
    pub fn final_text(&self) -> Option<&str> {
        self.steps
            .last()
            .and_then(|step| step.assistant_text.as_deref())
            .filter(|text| !text.is_empty())
    }

    pub fn provider_error(&self) -> Option<&ProviderError> {
        match &self.terminal {
            Some(TerminalReason::ProviderFailed(error)) => Some(error),
            _ => None,
        }
    }

    /// Every tool result across all steps, in order
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.steps.iter().flat_map(|step| step.tool_results.iter())
    }

    /// The state, or the provider error that ended it
    pub fn into_result(self) -> BridgeResult<Self> {
        match self.terminal {
            Some(TerminalReason::ProviderFailed(error)) => Err(BridgeError::Provider(error)),
            _ => Ok(self),
        }
    }

    /// Provider-neutral history: the user message, then each step's
    /// assistant turn and tool results
    pub fn transcript(&self) -> Vec<Message> {
        let mut messages = vec![Message::user(self.user_message.clone())];
        for step in &self.steps {
            if step.error.is_some() {
                continue;
            }
            let content = step.assistant_text.clone().unwrap_or_default();
            if step.tool_calls.is_empty() {
                if !content.is_empty() {
                    messages.push(Message::Assistant {
                        content,
                        tool_calls: Vec::new(),
                    });
                }
                continue;
            }
            messages.push(Message::Assistant {
                content,
                tool_calls: step.tool_calls.clone(),
            });
            messages.push(Message::ToolResults {
                results: step.tool_results.clone(),
            });
        }
        messages
    }
}
