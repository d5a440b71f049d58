//! JSON-RPC over WebSocket
//!
//! Used for application relays (e.g. a Photoshop plugin bridge) that speak
//! MCP methods over a plain WebSocket. Each connection owns its pending
//! request map: a reader task routes every response to the oneshot waiting
//! on its id, so concurrent calls on one socket resolve independently and in
//! any order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rmcp::model::CallToolResult;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::transport::ToolTransport;
use super::types::{RawToolOutput, ToolDescriptor, TransportError, TransportKind};

/// Default per-request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const PROTOCOL_VERSION: &str = "2024-11-05";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Responder = oneshot::Sender<Result<Value, TransportError>>;
type PendingMap = Arc<Mutex<HashMap<u64, Responder>>>;

/// Tool entry as listed by `tools/list`
#[derive(Debug, Deserialize)]
struct WireTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    input_schema: Option<Value>,
}

pub struct WebSocketTransport {
    sink: Mutex<SplitSink<Socket, Message>>,
    pending: PendingMap,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Open the socket and perform the MCP initialize handshake
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        Self::connect_with_timeout(url, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        url: &str,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (sink, stream) = socket.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(stream, pending.clone(), closed.clone()));

        let transport = Self {
            sink: Mutex::new(sink),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            request_timeout,
            reader,
        };

        transport
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "atelier", "version": env!("CARGO_PKG_VERSION")},
                }),
            )
            .await?;
        transport
            .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;

        Ok(transport)
    }

    async fn send(&self, frame: Value) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame.to_string().into()))
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))
    }

    /// Send one request and wait for the response with the same id
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            // Checked under the lock: the reader marks closed before draining
            let mut pending = self.pending.lock().await;
            if self.closed.load(Ordering::Acquire) {
                return Err(TransportError::Closed);
            }
            pending.insert(id, tx);
        }

        let frame = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        if let Err(e) = self.send(frame).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(TransportError::Timeout(self.request_timeout))
            }
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        // The reader owns the read half; stopping it releases the socket
        self.reader.abort();
    }
}

/// Route responses to their waiters until the socket ends
async fn read_loop(mut stream: SplitStream<Socket>, pending: PendingMap, closed: Arc<AtomicBool>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match parse_response(text.as_str()) {
                Some((id, result)) => {
                    if let Some(responder) = pending.lock().await.remove(&id) {
                        let _ = responder.send(result);
                    } else {
                        tracing::debug!("Dropping response for unknown request id {}", id);
                    }
                }
                None => tracing::debug!("Ignoring non-response frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("WebSocket read failed: {}", e);
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
    for (_, responder) in pending.lock().await.drain() {
        let _ = responder.send(Err(TransportError::Closed));
    }
}

/// Decode a JSON-RPC response frame into `(id, result)`
///
/// Notifications, requests and unparseable frames yield `None`.
fn parse_response(text: &str) -> Option<(u64, Result<Value, TransportError>)> {
    let frame: Value = serde_json::from_str(text).ok()?;
    let id = frame.get("id")?.as_u64()?;

    if let Some(error) = frame.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Some((id, Err(TransportError::Server(message))));
    }

    match frame.get("result") {
        Some(result) => Some((id, Ok(result.clone()))),
        None => None,
    }
}

#[async_trait]
impl ToolTransport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn list_tools(&self, server: &str) -> Result<Vec<ToolDescriptor>, TransportError> {
        let result = self.request("tools/list", json!({})).await?;
        let tools: Vec<WireTool> =
            serde_json::from_value(result.get("tools").cloned().unwrap_or_else(|| json!([])))
                .map_err(|e| TransportError::Protocol(e.to_string()))?;

        Ok(tools
            .into_iter()
            .map(|tool| {
                ToolDescriptor::new(
                    server,
                    tool.name,
                    tool.description.unwrap_or_default(),
                    tool.input_schema
                        .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
                )
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<RawToolOutput, TransportError> {
        let result = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        let result: CallToolResult =
            serde_json::from_value(result).map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(result.into())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        let outcome = self.sink.lock().await.close().await;
        self.reader.abort();
        for (_, responder) in self.pending.lock().await.drain() {
            let _ = responder.send(Err(TransportError::Closed));
        }
        outcome.map_err(|e| TransportError::ConnectionFailed(e.to_string()))
    }
}
