#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use relay_api::config::ServerConfig;
use relay_api::router::build_app_router;
use relay_api::state::AppState;
use relay_core::catalog::{NodeCatalog, NodeDefinition};
use relay_core::hooks::PromptHooks;
use relay_core::queue::InMemoryQueue;
use relay_events::{EventSink, EventStream, PublishLoop};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        heartbeat_interval_secs: 30,
        shutdown_timeout_secs: 5,
        outbound_buffer: 256,
        node_catalog_path: None,
    }
}

/// Catalog with a single `KSampler` class.
pub fn test_catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    catalog.register(
        "KSampler",
        NodeDefinition::new("KSampler").with_field("category", json!("sampling")),
    );
    catalog
}

/// Application state over an in-memory queue, plus the consumer end of
/// its publish queue.
pub fn test_state_with(hooks: PromptHooks) -> (AppState, EventStream, Arc<InMemoryQueue>) {
    let queue = Arc::new(InMemoryQueue::new());
    let (state, stream) = AppState::new(test_config(), queue.clone(), test_catalog(), hooks);
    (state, stream, queue)
}

pub fn test_state() -> (AppState, EventStream, Arc<InMemoryQueue>) {
    test_state_with(PromptHooks::new())
}

/// Build the full application router with all middleware layers.
///
/// This is the same builder `main.rs` uses, so integration tests exercise
/// the production middleware stack.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config()).expect("valid test config")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A real server on an ephemeral port with its publish loop running.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub queue: Arc<InMemoryQueue>,
    cancel: CancellationToken,
    publish: JoinHandle<()>,
    server: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let (state, stream, queue) = test_state();
        let cancel = CancellationToken::new();
        let sink: Arc<dyn EventSink> = state.fanout.clone();
        let publish = tokio::spawn(PublishLoop::run(stream, sink, cancel.clone()));

        let app = build_test_app(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            queue,
            cancel,
            publish,
            server,
        }
    }

    pub async fn connect(&self, client_id: Option<&str>) -> WsClient {
        let url = match client_id {
            Some(id) => format!("ws://{}/ws?clientId={id}", self.addr),
            None => format!("ws://{}/ws", self.addr),
        };
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        ws
    }

    /// Poll the registry until it holds `count` sessions.
    pub async fn wait_for_sessions(&self, count: usize) {
        for _ in 0..100 {
            if self.state.sessions.session_count().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {count} sessions, found {}",
            self.state.sessions.session_count().await
        );
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.publish.abort();
        self.server.abort();
    }
}

/// Next non-ping message, or `None` if the stream ended.
pub async fn next_message(ws: &mut WsClient) -> Option<WsMessage> {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a WebSocket message");
        match next {
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            Some(Ok(msg)) => return Some(msg),
            Some(Err(_)) | None => return None,
        }
    }
}

/// Next message, parsed as a JSON text frame.
pub async fn next_json(ws: &mut WsClient) -> Value {
    match next_message(ws).await {
        Some(WsMessage::Text(text)) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Next message, as raw binary frame bytes.
pub async fn next_binary(ws: &mut WsClient) -> Vec<u8> {
    match next_message(ws).await {
        Some(WsMessage::Binary(bytes)) => bytes,
        other => panic!("expected a binary frame, got {other:?}"),
    }
}
