//! Conversation engine
//!
//! Tool dispatch, per-conversation state and the step loop that ties a
//! provider to the connected servers.

mod dispatcher;
mod engine;
pub mod events;
mod prompt;
mod state;
mod types;

pub use dispatcher::{ToolDispatcher, DEFAULT_TOOL_TIMEOUT};
pub use engine::{ConversationEngine, MAX_STEPS};
pub use events::{event_channel, AgentEvent, AgentEventSender, EventReceiver, EventSender};
pub use prompt::build_preamble;
pub use state::{ConversationState, Step, TerminalReason};
pub use types::{ToolCall, ToolOutcome, ToolResult, ToolResultState};
