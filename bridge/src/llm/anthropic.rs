//! Anthropic Messages API dialect
//!
//! Tools are declared with a flat `input_schema`. The model asks for tools
//! through `tool_use` content blocks; results go back as `tool_result`
//! blocks inside a user message.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

use super::http::{decode_error, post_json};
use super::{
    generated_call_id, schema_or_empty, wire_tool_name, Message, ProviderAdapter, ProviderKind,
    ProviderResponse, ToolRequest, TurnContext,
};
use crate::agent::ToolCall;
use crate::error::ProviderError;
use crate::mcp::ToolRegistry;

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: ProviderKind::Anthropic.default_base_url().to_string(),
            max_tokens: 4096,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request body for one turn
    pub fn build_request_body(&self, context: &TurnContext, declarations: &[Value]) -> Value {
        let messages: Vec<Value> = context.messages.iter().map(encode_message).collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });
        if let Some(system) = context.system.as_deref().filter(|s| !s.is_empty()) {
            body["system"] = json!(system);
        }
        if !declarations.is_empty() {
            body["tools"] = json!(declarations);
        }
        body
    }

    /// Decode a Messages API response body
    pub fn parse_response(&self, raw: &Value) -> Result<ProviderResponse, ProviderError> {
        let blocks = raw
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| decode_error(PROVIDER, "response has no content array"))?;

        let text = blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ProviderResponse {
            text,
            tool_requests: self.parse_tool_requests(raw),
            stop_reason: raw
                .get("stop_reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key).map_err(|e| ProviderError::Request {
            provider: PROVIDER.to_string(),
            message: format!("invalid API key header: {}", e),
        })?;
        headers.insert(HeaderName::from_static("x-api-key"), key);
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(API_VERSION),
        );
        Ok(headers)
    }
}

fn encode_message(message: &Message) -> Value {
    match message {
        Message::User { content } => json!({"role": "user", "content": content}),
        Message::Assistant {
            content,
            tool_calls,
        } if tool_calls.is_empty() => json!({"role": "assistant", "content": content}),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
            if !content.is_empty() {
                blocks.push(json!({"type": "text", "text": content}));
            }
            blocks.extend(tool_calls.iter().map(|call| {
                // `input` must be an object even when the model sent something else
                let input = if call.arguments.is_object() {
                    call.arguments.clone()
                } else {
                    json!({})
                };
                json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": wire_tool_name(&call.tool_name),
                    "input": input,
                })
            }));
            json!({"role": "assistant", "content": blocks})
        }
        Message::ToolResults { results } => {
            let blocks: Vec<Value> = results
                .iter()
                .map(|result| {
                    json!({
                        "type": "tool_result",
                        "tool_use_id": result.id,
                        "content": result.content_text(),
                        "is_error": result.is_error(),
                    })
                })
                .collect();
            json!({"role": "user", "content": blocks})
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_tool_declarations(&self, registry: &ToolRegistry) -> Vec<Value> {
        registry
            .all()
            .into_iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": schema_or_empty(&tool.input_schema),
                })
            })
            .collect()
    }

    async fn send_turn(
        &self,
        context: &TurnContext,
        declarations: &[Value],
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(context, declarations);
        tracing::info!(
            "Anthropic request: model={} messages={} tools={}",
            self.model,
            context.messages.len(),
            declarations.len()
        );

        let raw = post_json(&self.http_client, PROVIDER, &url, self.headers()?, &body).await?;
        let response = self.parse_response(&raw)?;
        tracing::info!(
            "Anthropic response: {} chars, {} tool call(s)",
            response.text.len(),
            response.tool_requests.len()
        );
        Ok(response)
    }

    fn parse_tool_requests(&self, raw_response: &Value) -> Vec<ToolRequest> {
        let Some(blocks) = raw_response.get("content").and_then(Value::as_array) else {
            return Vec::new();
        };

        blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_use"))
            .map(|block| {
                let id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(generated_call_id);
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                let call = ToolCall::new(id, name, input);

                if name.is_empty() {
                    ToolRequest::Malformed {
                        call,
                        error: "tool_use block has no name".to_string(),
                    }
                } else if !call.arguments.is_object() {
                    let error = format!("Invalid arguments for tool {}: expected an object", name);
                    ToolRequest::Malformed { call, error }
                } else {
                    ToolRequest::Call(call)
                }
            })
            .collect()
    }
}
