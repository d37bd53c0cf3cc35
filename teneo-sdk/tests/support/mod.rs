//! Shared harness for the end-to-end scenarios: a scriptable mock coordinator
//! reachable over a real socket (the client dials a genuine `ws://` URL via
//! `tokio-tungstenite`, so the server side needs a real listener too) plus a
//! couple of mock HTTP receivers for the webhook scenarios. Grounded on the
//! teacher's own `oprf-service/src/api/v1.rs` (`axum::extract::ws::WebSocketUpgrade`)
//! for the server shape and `oprf-service/tests/setup.rs` for the
//! spin-up-a-real-server-per-test convention.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::{any, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};

use teneo_sdk::{SecretSource, TeneoConfig};

/// A 32-byte scalar well under the secp256k1 curve order; which exact key is used
/// does not matter for these scenarios, only that it is valid.
const TEST_SECRET: [u8; 32] = [0x07; 32];

/// A [`TeneoConfig`] with short timeouts, pointed at `url`, and every default
/// otherwise. Individual scenarios override whatever field they need to exercise.
pub fn test_config(url: &str) -> TeneoConfig {
    let mut config = TeneoConfig::new(url, SecretSource::Raw(TEST_SECRET));
    config.connection_timeout = Duration::from_secs(2);
    config.message_timeout = Duration::from_secs(2);
    config.reconnect.enabled = false;
    config
}

#[derive(Clone)]
struct ServerState {
    to_client_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<String>>>>,
    from_client_tx: mpsc::UnboundedSender<String>,
}

/// A single scripted coordinator connection. Only one client is expected to dial
/// in over the lifetime of one instance.
pub struct MockCoordinator {
    port: u16,
    to_client_tx: mpsc::UnboundedSender<String>,
    from_client_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl MockCoordinator {
    /// Binds an ephemeral port and serves a single `/ws` route.
    pub async fn spawn() -> Self {
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
        let (from_client_tx, from_client_rx) = mpsc::unbounded_channel();
        let state = ServerState {
            to_client_rx: Arc::new(Mutex::new(Some(to_client_rx))),
            from_client_tx,
        };
        let app = Router::new().route("/ws", any(ws_handler)).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock coordinator");
        let port = listener.local_addr().expect("local addr").port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock coordinator server");
        });

        MockCoordinator {
            port,
            to_client_tx,
            from_client_rx: Mutex::new(from_client_rx),
        }
    }

    /// The `ws://` URL the session should dial.
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Pushes a frame to the connected client.
    pub fn send(&self, frame: Value) {
        self.to_client_tx.send(frame.to_string()).expect("client still connected");
    }

    /// Waits for the next frame the client sent, panicking if none arrives within
    /// five seconds.
    pub async fn recv(&self) -> Value {
        self.recv_timeout(Duration::from_secs(5)).await.expect("client frame within timeout")
    }

    /// Waits up to `timeout` for the next frame the client sent.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<Value> {
        let mut rx = self.from_client_rx.lock().await;
        let text = tokio::time::timeout(timeout, rx.recv()).await.ok()??;
        Some(serde_json::from_str(&text).expect("client frame is valid json"))
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ServerState) {
    let mut to_client_rx = state
        .to_client_rx
        .lock()
        .await
        .take()
        .expect("one connection per MockCoordinator");
    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = state.from_client_tx.send(text.to_string());
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
            outbound = to_client_rx.recv() => {
                match outbound {
                    Some(text) => {
                        if socket.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

/// Drives the `challenge` -> `auth` -> `auth_success` handshake, assigning
/// `private_room_id` and `rooms` on success. Returns the address the client
/// signed with, read off its `auth` frame.
pub async fn drive_auth(mock: &MockCoordinator, rooms: Vec<Value>, private_room_id: &str) -> String {
    mock.send(json!({ "type": "challenge", "content": "nonce-123" }));
    let auth_frame = mock.recv().await;
    assert_eq!(auth_frame["type"], "auth");
    let address = auth_frame["data"]["address"].as_str().expect("auth frame carries address").to_string();
    mock.send(json!({
        "type": "auth_success",
        "data": {
            "id": "client-1",
            "address": address,
            "rooms": rooms,
            "private_room_id": private_room_id,
        }
    }));
    address
}

/// A mock webhook receiver that counts requests and always responds `500`.
pub async fn spawn_failing_webhook() -> (String, Arc<std::sync::atomic::AtomicUsize>) {
    let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/hook",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock webhook");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock webhook server");
    });
    (format!("http://127.0.0.1:{}/hook", addr.port()), hits)
}
