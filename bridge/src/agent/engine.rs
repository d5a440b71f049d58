//! Conversation state machine
//!
//! Drives one bounded exchange: each step sends the accumulated transcript
//! to the provider, dispatches whatever tools it asks for and feeds the
//! results into the next step. The loop ends when the model answers with
//! text only, when `max_steps` steps have run, or when the provider fails.

use std::time::{Duration, Instant};

use serde_json::Value;

use super::dispatcher::{ToolDispatcher, DEFAULT_TOOL_TIMEOUT};
use super::events::AgentEventSender;
use super::prompt::build_preamble;
use super::state::{ConversationState, Step, TerminalReason};
use super::types::{ToolCall, ToolResult};
use crate::llm::{ProviderAdapter, ToolRequest, TurnContext};
use crate::mcp::{ConnectionPool, ToolRegistry};

/// Default step ceiling
pub const MAX_STEPS: usize = 10;

pub struct ConversationEngine<'a> {
    provider: &'a dyn ProviderAdapter,
    registry: &'a ToolRegistry,
    pool: &'a ConnectionPool,
    system_prompt: Option<&'a str>,
    snapshot: Option<&'a Value>,
    tool_timeout: Duration,
    events: AgentEventSender,
}

impl<'a> ConversationEngine<'a> {
    pub fn new(
        provider: &'a dyn ProviderAdapter,
        registry: &'a ToolRegistry,
        pool: &'a ConnectionPool,
    ) -> Self {
        Self {
            provider,
            registry,
            pool,
            system_prompt: None,
            snapshot: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            events: AgentEventSender::none(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<&'a str>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_snapshot(mut self, snapshot: Option<&'a Value>) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: AgentEventSender) -> Self {
        self.events = events;
        self
    }

    /// Run a fresh conversation to a terminal state
    pub async fn run(&self, user_message: &str, max_steps: usize) -> ConversationState {
        let started = Instant::now();
        let mut state = ConversationState::new(user_message, max_steps);
        let dispatcher = ToolDispatcher::new(self.registry, self.pool).with_timeout(self.tool_timeout);

        self.events.conversation_start(user_message, max_steps);
        tracing::info!(
            "Conversation start: provider={} max_steps={}",
            self.provider.name(),
            max_steps
        );

        while state.can_continue() {
            let step_number = state.next_step_number();
            self.events.step_start(step_number);
            tracing::debug!("Step {}", step_number);

            let declarations = self.provider.build_tool_declarations(self.registry);
            let context = TurnContext {
                system: build_preamble(self.system_prompt, self.registry, self.snapshot),
                messages: state.transcript(),
            };

            let mut step = Step::new(step_number);
            let response = match self.provider.send_turn(&context, &declarations).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Provider call failed at step {}: {}", step_number, e);
                    self.events.error(&e.to_string());
                    step.error = Some(e.clone());
                    state.record_step(step);
                    state.finish(TerminalReason::ProviderFailed(e));
                    break;
                }
            };

            if !response.text.is_empty() {
                step.assistant_text = Some(response.text);
            }

            if response.tool_requests.is_empty() {
                state.record_step(step);
                self.events.step_complete(step_number, 0);
                state.finish(TerminalReason::Completed);
                break;
            }

            step.tool_calls = response
                .tool_requests
                .iter()
                .map(|request| request.call().clone())
                .collect();
            step.tool_results = self.execute(&dispatcher, response.tool_requests).await;

            tracing::info!(
                "Step {}: {} tool call(s), {} failed",
                step_number,
                step.tool_calls.len(),
                step.tool_results.iter().filter(|r| r.is_error()).count()
            );
            self.events.step_complete(step_number, step.tool_calls.len());
            state.record_step(step);
        }

        if !state.is_terminal() {
            tracing::warn!("Conversation reached the step limit ({})", max_steps);
            self.events.error(&format!(
                "Conversation reached maximum steps ({}) without completing",
                max_steps
            ));
            state.finish(TerminalReason::StepLimit);
        }

        if state.terminal_reason() == Some(&TerminalReason::Completed) {
            self.events.response_complete(
                state.final_text().unwrap_or_default(),
                state.steps().len(),
                started.elapsed(),
            );
        }
        state
    }

    /// Dispatch well-formed requests concurrently and answer malformed ones
    /// in place, keeping request order
    async fn execute(
        &self,
        dispatcher: &ToolDispatcher<'_>,
        requests: Vec<ToolRequest>,
    ) -> Vec<ToolResult> {
        let runnable: Vec<ToolCall> = requests
            .iter()
            .filter_map(|request| match request {
                ToolRequest::Call(call) => Some(call.clone()),
                ToolRequest::Malformed { .. } => None,
            })
            .collect();

        for call in &runnable {
            self.events.tool_start(&call.id, &call.tool_name, &call.arguments);
        }
        let mut dispatched = dispatcher.dispatch_many(&runnable).await.into_iter();

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = match request {
                ToolRequest::Call(call) => dispatched
                    .next()
                    .unwrap_or_else(|| ToolResult::failed(&call, "No result returned")),
                ToolRequest::Malformed { call, error } => {
                    tracing::warn!("Rejecting malformed call {}: {}", call.id, error);
                    ToolResult::failed(&call, error)
                }
            };
            self.events.tool_complete(
                &result.id,
                &result.tool_name,
                result.server_name.as_deref(),
                &result.content_text(),
                result.duration,
                result.is_error(),
            );
            results.push(result);
        }
        results
    }
}
