//! Integration tests for the relay over real WebSocket connections.
//!
//! These tests start a `RelayServer` on an ephemeral port and drive it with
//! tokio-tungstenite clients, covering the score, claim, give and best
//! flows end to end.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use tapscored::broadcaster::{spawn_best_broadcaster, BroadcastConfig};
use tapscored::registry::{spawn_registry, RegistryHandle};
use tapscored::server::RelayServer;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single expected frame
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// How long to listen before concluding nothing was sent
const SILENCE: Duration = Duration::from_millis(300);

/// Maximum time to wait for the registry to reflect a connect/disconnect
const REGISTRY_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Helpers
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test server context that manages server lifecycle.
struct TestServer {
    url: String,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
    server_task: JoinHandle<()>,
}

impl TestServer {
    /// Starts a server without the best broadcaster, so the only frames
    /// clients see are the ones a test provokes.
    async fn spawn_quiet() -> Self {
        Self::spawn_internal(None).await
    }

    /// Starts a server with the best broadcaster running.
    async fn spawn_with_broadcaster(config: BroadcastConfig) -> Self {
        Self::spawn_internal(Some(config)).await
    }

    async fn spawn_internal(broadcast: Option<BroadcastConfig>) -> Self {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();

        let server = RelayServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            registry.clone(),
            cancel_token.clone(),
        )
        .await
        .expect("bind test server");
        let url = format!("ws://{}", server.local_addr());

        if let Some(config) = broadcast {
            spawn_best_broadcaster(registry.clone(), config, cancel_token.clone());
        }

        let server_task = tokio::spawn(server.run());

        Self {
            url,
            registry,
            cancel_token,
            server_task,
        }
    }

    /// Connects a client and waits until its session is registered, so
    /// handles are assigned in connect order.
    async fn connect(&self) -> TestClient {
        let expected = self.registry.session_count().await + 1;
        let (ws, _response) = connect_async(self.url.as_str())
            .await
            .expect("connect to relay");
        self.wait_for_sessions(expected).await;
        TestClient { ws }
    }

    async fn wait_for_sessions(&self, expected: usize) {
        let start = Instant::now();
        while start.elapsed() < REGISTRY_WAIT_TIMEOUT {
            if self.registry.session_count().await == expected {
                return;
            }
            sleep(POLL_INTERVAL).await;
        }
        panic!(
            "expected {expected} sessions, registry has {}",
            self.registry.session_count().await
        );
    }

    async fn shutdown(self) {
        self.cancel_token.cancel();
        timeout(Duration::from_secs(6), self.server_task)
            .await
            .expect("server did not shut down")
            .unwrap();
    }
}

/// WebSocket client with JSON helpers.
struct TestClient {
    ws: WsStream,
}

impl TestClient {
    async fn send(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::text(text.to_owned())).await.unwrap();
    }

    /// Next JSON text frame, or `None` if nothing arrives within `duration`.
    async fn recv_timeout(&mut self, duration: Duration) -> Option<Value> {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.ws.next()).await {
                Err(_) => return None,
                Ok(Some(Ok(Message::Text(text)))) => {
                    return Some(serde_json::from_str(text.as_str()).expect("server sent JSON"));
                }
                Ok(Some(Ok(Message::Close(frame)))) => panic!("connection closed: {frame:?}"),
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => panic!("transport error: {e}"),
                Ok(None) => panic!("connection ended"),
            }
        }
    }

    async fn recv(&mut self) -> Value {
        self.recv_timeout(RECV_TIMEOUT)
            .await
            .expect("expected a frame from the relay")
    }

    /// Receives frames until one matches `expected`.
    async fn recv_until(&mut self, expected: &Value) {
        let deadline = Instant::now() + RECV_TIMEOUT;
        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(frame) = self.recv_timeout(remaining).await {
                if &frame == expected {
                    return;
                }
            }
        }
        panic!("did not receive {expected} within {RECV_TIMEOUT:?}");
    }

    async fn expect_silence(&mut self) {
        if let Some(frame) = self.recv_timeout(SILENCE).await {
            panic!("expected no frames, got {frame}");
        }
    }
}

// ============================================================================
// Score / Best
// ============================================================================

#[tokio::test]
async fn test_best_score_reaches_everyone() {
    let server = TestServer::spawn_with_broadcaster(BroadcastConfig::default()).await;

    let mut a = server.connect().await;
    a.send(json!({"score": 5})).await;

    let mut b = server.connect().await;
    b.send(json!({"score": 10})).await;

    a.recv_until(&json!({"best": 10})).await;
    b.recv_until(&json!({"best": 10})).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_no_best_while_all_scores_zero() {
    let config = BroadcastConfig {
        period: Duration::from_millis(50),
        ..BroadcastConfig::default()
    };
    let server = TestServer::spawn_with_broadcaster(config).await;

    let mut a = server.connect().await;
    let mut b = server.connect().await;
    a.send(json!({"score": 0})).await;

    a.expect_silence().await;
    b.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_best_ignores_idle_sessions() {
    let config = BroadcastConfig {
        period: Duration::from_millis(50),
        active_window: chrono::Duration::milliseconds(300),
    };
    let server = TestServer::spawn_with_broadcaster(config).await;

    let mut leader = server.connect().await;
    let mut chaser = server.connect().await;

    leader.send(json!({"score": 9})).await;
    chaser.send(json!({"score": 3})).await;
    chaser.recv_until(&json!({"best": 9})).await;

    // The leader goes quiet; the chaser keeps playing until its own score
    // becomes the best
    let deadline = Instant::now() + RECV_TIMEOUT;
    let mut saw_own_best = false;
    while Instant::now() < deadline && !saw_own_best {
        chaser.send(json!({"score": 3})).await;
        if let Some(frame) = chaser.recv_timeout(Duration::from_millis(60)).await {
            saw_own_best = frame == json!({"best": 3});
        }
    }
    assert!(saw_own_best, "idle leader still counted as best");

    // The idle leader still receives broadcasts
    leader.recv_until(&json!({"best": 3})).await;

    server.shutdown().await;
}

// ============================================================================
// Claim
// ============================================================================

#[tokio::test]
async fn test_claim_reaches_other_clients_only() {
    let server = TestServer::spawn_quiet().await;

    let mut a = server.connect().await;
    let mut b = server.connect().await;
    let mut c = server.connect().await;

    a.send(json!({"score": 5})).await;
    a.send(json!({"claimPoints": true})).await;

    let expected = json!({"claim": {"by": "p0", "score": 5}});
    assert_eq!(b.recv().await, expected);
    assert_eq!(c.recv().await, expected);
    a.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_claim_and_score_in_one_frame() {
    let server = TestServer::spawn_quiet().await;

    let mut a = server.connect().await;
    let mut b = server.connect().await;

    a.send(json!({"score": 7, "claimPoints": true})).await;

    assert_eq!(b.recv().await, json!({"claim": {"by": "p0", "score": 7}}));
    a.expect_silence().await;

    server.shutdown().await;
}

// ============================================================================
// Give
// ============================================================================

#[tokio::test]
async fn test_give_reaches_target_only() {
    let server = TestServer::spawn_quiet().await;

    let mut a = server.connect().await;
    let mut b = server.connect().await;
    let mut c = server.connect().await;

    a.send(json!({"give": {"to": "p1", "amount": 3}})).await;

    assert_eq!(b.recv().await, json!({"add": 3}));
    a.expect_silence().await;
    c.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_give_to_disconnected_client_is_dropped() {
    let server = TestServer::spawn_quiet().await;

    let mut a = server.connect().await;
    let b = server.connect().await;
    drop(b);
    server.wait_for_sessions(1).await;

    a.send(json!({"give": {"to": "p1", "amount": 3}})).await;
    a.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_claim_then_give_round_trip() {
    let server = TestServer::spawn_quiet().await;

    let mut a = server.connect().await;
    let mut b = server.connect().await;

    a.send(json!({"score": 4, "claimPoints": true})).await;
    let claim = b.recv().await;
    let claimant = claim["claim"]["by"].as_str().unwrap().to_string();

    b.send(json!({"give": {"to": claimant, "amount": 1}})).await;
    assert_eq!(a.recv().await, json!({"add": 1}));

    server.shutdown().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_handles_assigned_in_connect_order() {
    let server = TestServer::spawn_quiet().await;

    let _a = server.connect().await;
    let _b = server.connect().await;

    let mut handles: Vec<String> = server
        .registry
        .get_all_sessions()
        .await
        .into_iter()
        .map(|view| view.handle.to_string())
        .collect();
    handles.sort();
    assert_eq!(handles, vec!["p0", "p1"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_close_unregisters_session() {
    let server = TestServer::spawn_quiet().await;

    let mut a = server.connect().await;
    let _b = server.connect().await;

    a.ws.close(None).await.unwrap();
    server.wait_for_sessions(1).await;

    let remaining = server.registry.get_all_sessions().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].handle.as_str(), "p1");

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let server = TestServer::spawn_quiet().await;
    let mut a = server.connect().await;

    server.shutdown().await;

    let closed = timeout(RECV_TIMEOUT, async {
        loop {
            match a.ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "client was not closed on shutdown");
}
