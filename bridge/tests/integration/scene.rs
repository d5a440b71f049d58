//! End to end against the mock scene server attached in process

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use mock_scene_mcp::MockSceneServer;
use serde_json::{json, Value};

use atelier_bridge::agent::{event_channel, AgentEvent, TerminalReason, ToolCall};
use atelier_bridge::llm::OpenAiAdapter;
use atelier_bridge::mcp::{ConnectionPool, ToolRegistry, TransportKind};
use atelier_bridge::BridgeClient;

#[derive(Clone, Default)]
struct Script {
    turns: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

/// First turn asks for two tools, second turn answers in text
async fn chat_completions(State(script): State<Script>, Json(body): Json<Value>) -> Json<Value> {
    script.bodies.lock().unwrap().push(body);
    let turn = script.turns.fetch_add(1, Ordering::SeqCst);

    let message = if turn == 0 {
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "call_add", "type": "function", "function": {"name": "add_object", "arguments": "{\"name\": \"Sphere\", \"kind\": \"mesh\"}"}},
                {"id": "call_rm", "type": "function", "function": {"name": "remove_object", "arguments": "{\"name\": \"Ghost\"}"}}
            ]
        })
    } else {
        json!({"role": "assistant", "content": "Added Sphere; there was no Ghost to remove."})
    };
    Json(json!({"choices": [{"message": message, "finish_reason": "stop"}]}))
}

async fn spawn_openai() -> (String, Script) {
    let script = Script::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(script.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), script)
}

#[tokio::test]
async fn test_conversation_drives_embedded_scene() {
    let (base_url, script) = spawn_openai().await;
    let adapter = OpenAiAdapter::new("sk-test", "gpt-test").with_base_url(base_url);
    let (tx, mut rx) = event_channel();

    let mut client = BridgeClient::new(Box::new(adapter), ConnectionPool::new(), ToolRegistry::new())
        .with_system_prompt("You edit a 3D scene.")
        .with_event_sender(tx);
    let tool_count = client
        .attach_embedded("scene", Arc::new(MockSceneServer::new()))
        .await
        .unwrap();
    assert_eq!(tool_count, 4);
    assert_eq!(client.status()[0].kind, TransportKind::Embedded);

    client.set_context_snapshot(Some(json!({"selected": "Cube"})));
    let state = client.chat("Add a sphere and delete the ghost", 4).await;

    assert_eq!(state.terminal_reason(), Some(&TerminalReason::Completed));
    assert_eq!(state.steps().len(), 2);
    let results = &state.steps()[0].tool_results;
    assert_eq!(results[0].value().unwrap()["name"], "Sphere");
    assert!(results[1].is_error());
    assert!(results[1].error().unwrap().contains("Ghost"));

    let bodies = script.bodies.lock().unwrap();
    let first_system = bodies[0]["messages"][0]["content"].as_str().unwrap();
    assert!(first_system.starts_with("You edit a 3D scene."));
    assert!(first_system.contains("- add_object [scene]"));
    assert!(first_system.contains("\"selected\": \"Cube\""));
    assert_eq!(bodies[0]["tools"].as_array().unwrap().len(), 4);

    let tool_messages: Vec<&Value> = bodies[1]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] == "tool")
        .collect();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0]["tool_call_id"], "call_add");
    assert_eq!(tool_messages[1]["tool_call_id"], "call_rm");
    drop(bodies);

    // The scene now holds the sphere
    let scene = client
        .call_tool(&ToolCall::new("check", "get_scene", json!({})))
        .await;
    let names: Vec<&str> = scene.value().unwrap()["objects"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["name"].as_str())
        .collect();
    assert!(names.contains(&"Sphere"));

    drop(client);
    let mut completed = false;
    while let Some(event) = rx.recv().await {
        if let AgentEvent::ResponseComplete { steps, .. } = event {
            assert_eq!(steps, 2);
            completed = true;
        }
    }
    assert!(completed);
}
