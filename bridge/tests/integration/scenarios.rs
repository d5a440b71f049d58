//! Connection, dispatch and conversation scenarios through the client facade

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use atelier_bridge::agent::{TerminalReason, ToolCall};
use atelier_bridge::config::McpServerConfig;
use atelier_bridge::llm::Message;
use atelier_bridge::mcp::{ConnectionPool, ToolRegistry};
use atelier_bridge::BridgeClient;
use serde_json::json;

use crate::support::{text_reply, tool_reply, FakeConnector, ScriptedProvider};

fn two_servers() -> BTreeMap<String, McpServerConfig> {
    BTreeMap::from([
        ("server1".to_string(), McpServerConfig::stdio("server1-mcp", vec![])),
        ("server2".to_string(), McpServerConfig::stdio("server2-mcp", vec![])),
    ])
}

fn client_with(connector: Arc<FakeConnector>, provider: ScriptedProvider) -> BridgeClient {
    BridgeClient::new(
        Box::new(provider),
        ConnectionPool::with_connector(connector),
        ToolRegistry::new(),
    )
}

#[tokio::test]
async fn test_two_servers_list_tools_by_server() {
    let connector = Arc::new(
        FakeConnector::default()
            .with_server("server1", &["tool1"])
            .with_server("server2", &["tool2"]),
    );
    let mut client = client_with(connector, ScriptedProvider::new(vec![]));

    let outcome = client.connect(&two_servers()).await;
    assert!(outcome.values().all(|ok| *ok));

    let expected = BTreeMap::from([
        ("server1".to_string(), vec!["tool1".to_string()]),
        ("server2".to_string(), vec!["tool2".to_string()]),
    ]);
    assert_eq!(client.list_tools_by_server(), expected);
    assert_eq!(client.find_owning_server("tool2"), Some("server2"));
    assert_eq!(client.connected_servers(), vec!["server1", "server2"]);
}

#[tokio::test]
async fn test_tool_result_flows_into_next_step() {
    let connector = Arc::new(FakeConnector::default().with_server("server1", &["tool1"]));
    let provider = ScriptedProvider::new(vec![
        tool_reply(&[("call_1", "tool1", json!({"param": "value"}))]),
        text_reply("All done."),
    ]);
    let contexts = provider.contexts.clone();
    let mut client = client_with(connector, provider);
    client
        .connect(&BTreeMap::from([(
            "server1".to_string(),
            McpServerConfig::stdio("server1-mcp", vec![]),
        )]))
        .await;

    let state = client.chat("use tool1", 5).await;

    assert_eq!(state.steps().len(), 2);
    assert_eq!(state.terminal_reason(), Some(&TerminalReason::Completed));
    assert_eq!(state.final_text(), Some("All done."));

    let first = &state.steps()[0];
    assert_eq!(first.tool_calls[0].arguments, json!({"param": "value"}));
    assert_eq!(first.tool_results[0].value(), Some(&json!("success")));
    assert_eq!(first.tool_results[0].server_name.as_deref(), Some("server1"));

    let contexts = contexts.lock().unwrap();
    assert_eq!(contexts.len(), 2);
    match contexts[1].messages.last().unwrap() {
        Message::ToolResults { results } => {
            assert_eq!(results[0].id, "call_1");
            assert_eq!(results[0].content_text(), "success");
        }
        other => panic!("expected tool results in step 1 context, got {:?}", other),
    }
    let user_messages = contexts[1]
        .messages
        .iter()
        .filter(|m| matches!(m, Message::User { .. }))
        .count();
    assert_eq!(user_messages, 1);
}

#[tokio::test]
async fn test_empty_command_fails_only_that_server() {
    let connector = Arc::new(FakeConnector::default().with_server("good", &["tool1"]));
    let mut client = client_with(connector.clone(), ScriptedProvider::new(vec![]));

    let outcome = client
        .connect(&BTreeMap::from([
            ("bad".to_string(), McpServerConfig::stdio("", vec![])),
            ("good".to_string(), McpServerConfig::stdio("good-mcp", vec![])),
        ]))
        .await;

    assert_eq!(outcome["bad"], false);
    assert_eq!(outcome["good"], true);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert!(!client.is_connected("bad"));
}

#[tokio::test]
async fn test_unreachable_server_is_isolated() {
    let connector = Arc::new(FakeConnector::default().with_server("server1", &["tool1"]));
    let mut client = client_with(connector, ScriptedProvider::new(vec![]));

    let outcome = client.connect(&two_servers()).await;

    assert_eq!(outcome["server1"], true);
    assert_eq!(outcome["server2"], false);
    assert_eq!(client.list_tools_by_server().len(), 1);
}

#[tokio::test]
async fn test_dispatch_order_and_partial_failure_through_conversation() {
    let connector = Arc::new(FakeConnector::default().with_server("server1", &["tool1", "fail"]));
    let provider = ScriptedProvider::new(vec![
        tool_reply(&[
            ("a", "tool1", json!({"delay_ms": 40})),
            ("b", "fail", json!({})),
            ("c", "tool1", json!({"delay_ms": 0})),
            ("d", "export_png", json!({})),
        ]),
        text_reply("Two of four worked."),
    ]);
    let mut client = client_with(connector.clone(), provider);
    client.connect(&two_servers()).await;

    let state = client.chat("go", 5).await;
    let results = &state.steps()[0].tool_results;

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert!(results[0].value().is_some());
    assert!(results[1].error().unwrap().contains("backend unavailable"));
    assert!(results[2].value().is_some());
    assert_eq!(results[3].error(), Some("Tool export_png not found"));
    // The unknown tool never reached a transport
    assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
    assert_eq!(state.terminal_reason(), Some(&TerminalReason::Completed));
}

#[tokio::test]
async fn test_step_bound_holds_when_model_never_stops() {
    let connector = Arc::new(FakeConnector::default().with_server("server1", &["tool1"]));
    let provider = ScriptedProvider::new(vec![]);
    let contexts = provider.contexts.clone();
    let mut client = client_with(connector, provider);
    client.connect(&two_servers()).await;

    let state = client.chat("never stop", 3).await;

    assert_eq!(state.steps().len(), 3);
    assert_eq!(state.current_step_index(), 2);
    assert!(!state.can_continue());
    assert_eq!(state.terminal_reason(), Some(&TerminalReason::StepLimit));
    assert_eq!(contexts.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_disconnect_clears_registry() {
    let connector = Arc::new(
        FakeConnector::default()
            .with_server("server1", &["tool1"])
            .with_server("server2", &["tool2"]),
    );
    let mut client = client_with(connector, ScriptedProvider::new(vec![]));
    client.connect(&two_servers()).await;

    assert!(client.disconnect_server("server2").await);
    assert!(client.find_owning_server("tool2").is_none());

    client.disconnect().await;
    client.disconnect().await;
    assert!(client.connected_servers().is_empty());
    assert!(client.list_tools_by_server().is_empty());

    let result = client.call_tool(&ToolCall::new("x", "tool1", json!({}))).await;
    assert_eq!(result.error(), Some("Tool tool1 not found"));
}
