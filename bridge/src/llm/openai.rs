//! OpenAI Chat Completions dialect
//!
//! Tools are declared as `{"type": "function", "function": {...}}`. Tool
//! invocations arrive as a `tool_calls` array whose arguments are JSON
//! encoded strings; decoding happens here so the rest of the crate only sees
//! structured arguments. Each result goes back as its own `tool` message.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use super::http::{decode_error, post_json};
use super::{
    generated_call_id, schema_or_empty, wire_tool_name, Message, ProviderAdapter, ProviderKind,
    ProviderResponse, ToolRequest, TurnContext,
};
use crate::agent::ToolCall;
use crate::error::ProviderError;
use crate::mcp::ToolRegistry;

const PROVIDER: &str = "openai";

pub struct OpenAiAdapter {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: ProviderKind::OpenAi.default_base_url().to_string(),
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
        let mut messages = Vec::with_capacity(context.messages.len() + 1);
        if let Some(system) = context.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(json!({"role": "system", "content": system}));
        }
        for message in &context.messages {
            encode_message(message, &mut messages);
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });
        if !declarations.is_empty() {
            body["tools"] = json!(declarations);
        }
        body
    }

    /// Decode a Chat Completions response body
    pub fn parse_response(&self, raw: &Value) -> Result<ProviderResponse, ProviderError> {
        let choice = first_choice(raw)
            .ok_or_else(|| decode_error(PROVIDER, "response has no choices"))?;
        let message = choice
            .get("message")
            .ok_or_else(|| decode_error(PROVIDER, "choice has no message"))?;

        Ok(ProviderResponse {
            text: message
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            tool_requests: self.parse_tool_requests(raw),
            stop_reason: choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|e| {
            ProviderError::Request {
                provider: PROVIDER.to_string(),
                message: format!("invalid API key header: {}", e),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

fn first_choice(raw: &Value) -> Option<&Value> {
    raw.get("choices")?.as_array()?.first()
}

fn encode_message(message: &Message, out: &mut Vec<Value>) {
    match message {
        Message::User { content } => out.push(json!({"role": "user", "content": content})),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let text = if content.is_empty() && !tool_calls.is_empty() {
                Value::Null
            } else {
                json!(content)
            };
            let mut encoded = json!({"role": "assistant", "content": text});
            if !tool_calls.is_empty() {
                encoded["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": wire_tool_name(&call.tool_name),
                                "arguments": encode_arguments(&call.arguments),
                            }
                        })
                    })
                    .collect();
            }
            out.push(encoded);
        }
        Message::ToolResults { results } => {
            out.extend(results.iter().map(|result| {
                json!({
                    "role": "tool",
                    "tool_call_id": result.id,
                    "content": result.content_text(),
                })
            }));
        }
    }
}

/// Arguments back to the wire: undecodable ones are echoed verbatim
fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// One `tool_calls` entry; a failure only affects this entry
fn parse_tool_call(entry: &Value) -> ToolRequest {
    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generated_call_id);
    let function = entry.get("function");
    let name = function
        .and_then(|f| f.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let raw_arguments = function
        .and_then(|f| f.get("arguments"))
        .cloned()
        .unwrap_or(Value::Null);

    if name.is_empty() {
        return ToolRequest::Malformed {
            call: ToolCall::new(id, name, raw_arguments),
            error: "tool call has no function name".to_string(),
        };
    }

    match raw_arguments {
        Value::Null => ToolRequest::Call(ToolCall::new(id, name, json!({}))),
        Value::String(raw) if raw.trim().is_empty() => {
            ToolRequest::Call(ToolCall::new(id, name, json!({})))
        }
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(arguments) if arguments.is_object() => {
                ToolRequest::Call(ToolCall::new(id, name, arguments))
            }
            Ok(_) => ToolRequest::Malformed {
                error: format!("Invalid arguments for tool {}: expected a JSON object", name),
                call: ToolCall::new(id, name, Value::String(raw)),
            },
            Err(e) => ToolRequest::Malformed {
                error: format!("Invalid JSON arguments for tool {}: {}", name, e),
                call: ToolCall::new(id, name, Value::String(raw)),
            },
        },
        // Some compatible servers send the object directly
        Value::Object(arguments) => {
            ToolRequest::Call(ToolCall::new(id, name, Value::Object(arguments)))
        }
        other => ToolRequest::Malformed {
            error: format!("Invalid arguments for tool {}: expected a JSON object", name),
            call: ToolCall::new(id, name, other),
        },
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": schema_or_empty(&tool.input_schema),
                    }
                })
            })
            .collect()
    }

    async fn send_turn(
        &self,
        context: &TurnContext,
        declarations: &[Value],
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(context, declarations);
        tracing::info!(
            "OpenAI request: model={} messages={} tools={}",
            self.model,
            context.messages.len(),
            declarations.len()
        );

        let raw = post_json(&self.http_client, PROVIDER, &url, self.headers()?, &body).await?;
        let response = self.parse_response(&raw)?;
        tracing::info!(
            "OpenAI response: {} chars, {} tool call(s)",
            response.text.len(),
            response.tool_requests.len()
        );
        Ok(response)
    }

    fn parse_tool_requests(&self, raw_response: &Value) -> Vec<ToolRequest> {
        first_choice(raw_response)
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("tool_calls"))
            .and_then(Value::as_array)
            .map(|calls| calls.iter().map(parse_tool_call).collect())
            .unwrap_or_default()
    }
}
