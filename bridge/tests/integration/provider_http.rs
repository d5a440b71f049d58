//! Provider adapters against a local HTTP server

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use atelier_bridge::error::ProviderError;
use atelier_bridge::llm::{AnthropicAdapter, Message, OpenAiAdapter, ProviderAdapter, ToolRequest, TurnContext};

/// Canned reply plus everything the server received
#[derive(Clone)]
struct Recorder {
    status: StatusCode,
    reply: Value,
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

async fn record(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    recorder.requests.lock().unwrap().push((headers, body));
    (recorder.status, Json(recorder.reply.clone()))
}

/// Serve `reply` with `status` on `path`; returns the base URL
async fn spawn_provider(path: &str, status: StatusCode, reply: Value) -> (String, Recorder) {
    let recorder = Recorder {
        status,
        reply,
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route(path, post(record))
        .with_state(recorder.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), recorder)
}

fn context() -> TurnContext {
    TurnContext {
        system: Some("You edit scenes.".to_string()),
        messages: vec![Message::user("add a sphere")],
    }
}

#[tokio::test]
async fn test_anthropic_non_success_carries_status_and_body() {
    let (base_url, _) = spawn_provider(
        "/v1/messages",
        StatusCode::TOO_MANY_REQUESTS,
        json!({"type": "error", "error": {"type": "rate_limit_error"}}),
    )
    .await;
    let adapter = AnthropicAdapter::new("test-key", "claude-test").with_base_url(base_url);

    let err = adapter.send_turn(&context(), &[]).await.unwrap_err();

    match &err {
        ProviderError::Status { provider, status, body } => {
            assert_eq!(provider, "anthropic");
            assert_eq!(*status, 429);
            assert!(body.contains("rate_limit_error"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn test_anthropic_request_shape() {
    let (base_url, recorder) = spawn_provider(
        "/v1/messages",
        StatusCode::OK,
        json!({
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "add_object", "input": {"name": "Sphere", "kind": "mesh"}}
            ],
            "stop_reason": "tool_use"
        }),
    )
    .await;
    let adapter = AnthropicAdapter::new("test-key", "claude-test")
        .with_base_url(base_url)
        .with_max_tokens(512);

    let declarations = vec![json!({"name": "add_object", "description": "", "input_schema": {"type": "object"}})];
    let response = adapter.send_turn(&context(), &declarations).await.unwrap();

    assert_eq!(response.tool_requests.len(), 1);
    assert_eq!(response.tool_requests[0].call().tool_name, "add_object");

    let requests = recorder.requests.lock().unwrap();
    let (headers, body) = &requests[0];
    assert_eq!(headers["x-api-key"], "test-key");
    assert_eq!(headers["anthropic-version"], "2023-06-01");
    assert_eq!(body["model"], "claude-test");
    assert_eq!(body["max_tokens"], 512);
    assert_eq!(body["system"], "You edit scenes.");
    assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
}

#[tokio::test]
async fn test_openai_turn_decodes_arguments_and_isolates_bad_ones() {
    let (base_url, recorder) = spawn_provider(
        "/v1/chat/completions",
        StatusCode::OK,
        json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Adding it now.",
                    "tool_calls": [
                        {"id": "call_1", "type": "function", "function": {"name": "add_object", "arguments": "{\"name\":\"Sphere\",\"kind\":\"mesh\"}"}},
                        {"id": "call_2", "type": "function", "function": {"name": "add_object", "arguments": "{not json"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }),
    )
    .await;
    let adapter = OpenAiAdapter::new("sk-test", "gpt-test").with_base_url(format!("{}/", base_url));

    let response = adapter.send_turn(&context(), &[]).await.unwrap();

    assert_eq!(response.text, "Adding it now.");
    assert_eq!(response.tool_requests.len(), 2);
    assert_eq!(
        response.tool_requests[0].call().arguments,
        json!({"name": "Sphere", "kind": "mesh"})
    );
    assert!(matches!(response.tool_requests[1], ToolRequest::Malformed { .. }));

    let requests = recorder.requests.lock().unwrap();
    let (headers, body) = &requests[0];
    assert_eq!(headers["authorization"], "Bearer sk-test");
    assert_eq!(body["messages"][0], json!({"role": "system", "content": "You edit scenes."}));
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn test_openai_server_error() {
    let (base_url, _) = spawn_provider(
        "/v1/chat/completions",
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": {"message": "upstream exploded"}}),
    )
    .await;
    let adapter = OpenAiAdapter::new("sk-test", "gpt-test").with_base_url(base_url);

    let err = adapter.send_turn(&context(), &[]).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().starts_with("openai API error 500"));
}
