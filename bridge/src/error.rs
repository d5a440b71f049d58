//! Error taxonomy for the bridge
//!
//! Connection and tool failures are normally captured into data
//! (`ToolResult` errors, per-server `false` in connect maps) and only become
//! a [`BridgeError`] at API edges. Provider and configuration errors are
//! returned to the caller.

use thiserror::Error;

/// Errors surfaced by the bridge
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// A server could not be reached or its transport failed
    #[error("connection to '{server}' failed: {message}")]
    Connection { server: String, message: String },

    /// Requested tool is absent from the registry
    #[error("Tool {0} not found")]
    ToolNotFound(String),

    /// The owning server rejected the call or the transport failed mid-call
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// The LLM API returned a non-success response
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Missing credentials or malformed server/transport spec
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BridgeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        BridgeError::Configuration(message.into())
    }
}

/// Failure talking to an LLM provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Non-2xx response
    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// Request never produced a response (DNS, TLS, timeout, ...)
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    /// Response body did not have the expected shape
    #[error("{provider} response could not be decoded: {message}")]
    Decode { provider: String, message: String },
}

impl ProviderError {
    /// HTTP status for `Status` errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
