//! LLM provider abstraction
//!
//! The conversation talks to providers only through [`ProviderAdapter`].
//! Each adapter owns its wire dialect: tool declaration shape, how tool
//! invocations are embedded in responses and how tool results are fed back.

mod anthropic;
mod http;
mod openai;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::agent::{ToolCall, ToolResult};
use crate::config::LlmConfig;
use crate::error::{BridgeError, BridgeResult, ProviderError};
use crate::mcp::ToolRegistry;

/// Provider-neutral conversation message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    /// Results answering the preceding assistant message's tool calls
    ToolResults {
        results: Vec<ToolResult>,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }
}

/// Everything sent to the provider for one turn
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Call(ToolCall),
    /// The request could not be decoded; `call.arguments` holds the raw text
    Malformed { call: ToolCall, error: String },
}

impl ToolRequest {
    pub fn call(&self) -> &ToolCall {
        match self {
            ToolRequest::Call(call) | ToolRequest::Malformed { call, .. } => call,
        }
    }
}

/// Normalized provider reply
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// Assistant text, possibly empty
    pub text: String,
    pub tool_requests: Vec<ToolRequest>,
    pub stop_reason: Option<String>,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name used in errors and logs
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Tool declarations in this provider's shape
    fn build_tool_declarations(&self, registry: &ToolRegistry) -> Vec<Value>;

    /// Issue one chat request
    async fn send_turn(
        &self,
        context: &TurnContext,
        declarations: &[Value],
    ) -> Result<ProviderResponse, ProviderError>;

    /// Extract tool invocations from a raw response body, in order
    fn parse_tool_requests(&self, raw_response: &Value) -> Vec<ToolRequest>;
}

/// Supported provider dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    #[serde(alias = "open_ai")]
    OpenAi,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
            ProviderKind::OpenAi => "gpt-4o",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anthropic => f.write_str("anthropic"),
            ProviderKind::OpenAi => f.write_str("openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" | "open_ai" | "gpt" => Ok(ProviderKind::OpenAi),
            other => Err(BridgeError::configuration(format!(
                "unknown provider '{}' (expected anthropic or openai)",
                other
            ))),
        }
    }
}

/// Build the adapter selected by `config`
///
/// Fails with a configuration error when the API key is absent.
pub fn adapter_from_config(config: &LlmConfig) -> BridgeResult<Box<dyn ProviderAdapter>> {
    let api_key = config.api_key()?;
    let adapter: Box<dyn ProviderAdapter> = match config.provider {
        ProviderKind::Anthropic => Box::new(
            AnthropicAdapter::new(api_key, config.model())
                .with_base_url(config.base_url())
                .with_max_tokens(config.max_tokens),
        ),
        ProviderKind::OpenAi => Box::new(
            OpenAiAdapter::new(api_key, config.model())
                .with_base_url(config.base_url())
                .with_max_tokens(config.max_tokens),
        ),
    };
    tracing::debug!("Using {} provider with model {}", adapter.name(), adapter.model());
    Ok(adapter)
}

/// Strip schema keys that provider tool validators reject
pub(crate) fn clean_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => {
            let mut cleaned = serde_json::Map::new();
            for (key, value) in obj {
                match key.as_str() {
                    "$schema" | "title" => continue,
                    // Property names are user data, only their schemas get cleaned
                    "properties" | "definitions" | "$defs" => {
                        let entries = match value {
                            Value::Object(entries) => Value::Object(
                                entries
                                    .iter()
                                    .map(|(name, schema)| (name.clone(), clean_schema(schema)))
                                    .collect(),
                            ),
                            other => other.clone(),
                        };
                        cleaned.insert(key.clone(), entries);
                    }
                    _ => {
                        cleaned.insert(key.clone(), clean_schema(value));
                    }
                }
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(clean_schema).collect()),
        other => other.clone(),
    }
}

/// Object schema used when a tool advertises none
pub(crate) fn schema_or_empty(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) if !obj.is_empty() => clean_schema(schema),
        _ => serde_json::json!({"type": "object", "properties": {}}),
    }
}

/// Name echoed back for a call the model issued without one
pub(crate) const UNNAMED_TOOL: &str = "unnamed_tool";

/// Tool name as written back into the transcript
///
/// Providers reject an empty name in history, which would turn one bad
/// call into a failed conversation.
pub(crate) fn wire_tool_name(name: &str) -> &str {
    if name.trim().is_empty() {
        UNNAMED_TOOL
    } else {
        name
    }
}

/// Id for a tool call the provider did not label
pub(crate) fn generated_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!("mystery".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    }

    #[test]
    fn test_clean_schema_strips_meta_keys() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "AddObjectParams",
            "type": "object",
            "properties": {
                "name": {"type": "string", "title": "Name"},
                "title": {"type": "string"}
            }
        });
        assert_eq!(
            clean_schema(&schema),
            json!({"type": "object", "properties": {
                "name": {"type": "string"},
                "title": {"type": "string"}
            }})
        );
    }

    #[test]
    fn test_schema_or_empty() {
        assert_eq!(schema_or_empty(&Value::Null), json!({"type": "object", "properties": {}}));
        assert_eq!(schema_or_empty(&json!({})), json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_adapter_from_config_requires_key() {
        let config = LlmConfig {
            api_key_env: Some("ATELIER_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..Default::default()
        };
        let err = adapter_from_config(&config).err().unwrap();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }
}
