//! Multi-server AI conversation bridge
//!
//! Connects to creative-application MCP servers (stdio, HTTP, WebSocket or
//! in-process), aggregates their tools and lets an LLM drive them through a
//! bounded multi-step conversation.

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;

pub use client::BridgeClient;
pub use error::{BridgeError, BridgeResult, ProviderError};
