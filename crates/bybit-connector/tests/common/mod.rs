/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for bybit-connector tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bybit_connector::{BybitClient, ClientConfig, Credentials, Market};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_API_SECRET: &str = "test-secret";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_credentials() -> Credentials {
    Credentials::new(TEST_API_KEY, TEST_API_SECRET)
}

/// Client config with millisecond retry delays
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        retry_delay: Duration::from_millis(10),
        ..ClientConfig::default()
    }
}

pub fn client_for(server: &MockServer, market: Market, config: ClientConfig) -> BybitClient {
    BybitClient::with_config_and_base_url(market, config, &server.uri())
        .expect("client should build")
        .with_credentials(test_credentials())
}

/// Bybit response envelope
pub fn envelope(code: i64, message: &str, result: Value) -> Value {
    json!({
        "ret_code": code,
        "ret_msg": message,
        "ext_code": "",
        "result": result,
        "time_now": "1700000000.000000",
    })
}

pub type ServerSocket = WebSocketStream<TcpStream>;

/// Local WebSocket server; each accepted connection runs `handler` with its
/// zero-based connection index.
pub struct WsServer {
    pub url: String,
    pub connections: Arc<AtomicUsize>,
}

impl WsServer {
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

pub async fn spawn_ws_server<F, Fut>(handler: F) -> WsServer
where
    F: Fn(usize, ServerSocket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let url = format!("ws://{}", listener.local_addr().expect("local addr"));
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Ok(socket) = accept_async(stream).await {
                    (*handler)(index, socket).await;
                }
            });
        }
    });

    WsServer { url, connections }
}

/// Next JSON text frame from the client, or `None` once it disconnects.
pub async fn recv_json(socket: &mut ServerSocket) -> Option<Value> {
    while let Some(message) = socket.next().await {
        match message.ok()? {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}

pub async fn send_json(socket: &mut ServerSocket, value: Value) {
    let _ = socket.send(Message::Text(value.to_string().into())).await;
}

/// Acknowledge a futures `op` request the way the exchange does. Returns the
/// op name.
pub async fn answer_op(socket: &mut ServerSocket, request: &Value, success: bool) -> String {
    let op = request["op"].as_str().unwrap_or_default().to_string();
    let ret_msg = if op == "ping" { "pong" } else { "" };
    send_json(
        socket,
        json!({
            "success": success,
            "ret_msg": ret_msg,
            "conn_id": "test-conn",
            "request": request,
        }),
    )
    .await;
    op
}

/// Answer auth, subscribe and ping requests until the client hangs up.
pub async fn serve_ops(socket: &mut ServerSocket) {
    while let Some(request) = recv_json(socket).await {
        answer_op(socket, &request, true).await;
    }
}

/// Poll `condition` every 10 ms until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
