//! Connection handler for individual WebSocket clients.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Completes the WebSocket handshake
//! - Registers a session and keeps its handle for the connection lifetime
//! - Forwards inbound text frames, in order, to the registry actor
//! - Runs a writer task draining the session's transport into the socket
//! - Unregisters the session on close, error or shutdown
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::net::SocketAddr;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tapscore_core::Handle;

use crate::registry::{OutboundFrame, RegistryError, RegistryHandle, Transport};

/// Maximum inbound text frame size (1 MB)
pub const MAX_MESSAGE_SIZE: usize = 1_048_576;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Lifecycle of one client connection.
///
/// `Connecting -> Open -> Closed`. `Closed` is terminal and reachable from
/// either other state. Frames are exchanged only while `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// Moves `Connecting` to `Open`. Returns false from any other state.
    pub fn open(&mut self) -> bool {
        match self {
            Self::Connecting => {
                *self = Self::Open;
                true
            }
            Self::Open | Self::Closed => false,
        }
    }

    /// Moves to `Closed` from any state.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Raw TCP stream, upgraded in `run`
    stream: TcpStream,

    /// Remote address, for logs
    peer: Option<SocketAddr>,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Fires on server shutdown
    cancel_token: CancellationToken,

    /// Sequential number of this connection, for logs
    connection_number: u64,

    state: ConnectionState,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        stream: TcpStream,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
        connection_number: u64,
    ) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            stream,
            peer,
            registry,
            cancel_token,
            connection_number,
            state: ConnectionState::Connecting,
        }
    }

    /// Runs the connection until the client goes away or the server shuts
    /// down.
    ///
    /// Returns the handle the session was registered under, if it got that
    /// far.
    pub async fn run(self) -> Result<Option<Handle>, ConnectionError> {
        let Self {
            stream,
            peer,
            registry,
            cancel_token,
            connection_number,
            mut state,
        } = self;

        let ws = accept_async(stream)
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
        let (mut sink, mut source) = ws.split();

        let (transport, outbound) = Transport::channel();
        let handle = match registry.register(transport).await {
            Ok(handle) => handle,
            Err(e) => {
                state.close();
                reject(&mut sink, &e).await;
                return Err(ConnectionError::Registry(e));
            }
        };
        state.open();

        debug!(
            handle = %handle,
            connection = connection_number,
            peer = ?peer,
            "Client connected"
        );

        let writer_stop = CancellationToken::new();
        let writer = spawn_writer(sink, outbound, writer_stop.clone(), handle.clone());

        let mut outcome = Ok(Some(handle.clone()));

        while state.is_open() {
            let msg = tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!(handle = %handle, "Closing connection for shutdown");
                    break;
                }

                msg = source.next() => msg,
            };

            match msg {
                Some(Ok(Message::Text(text))) => {
                    let size = text.as_str().len();
                    if size > MAX_MESSAGE_SIZE {
                        warn!(
                            handle = %handle,
                            size,
                            max = MAX_MESSAGE_SIZE,
                            "Dropping oversized frame"
                        );
                        continue;
                    }

                    if let Err(e) = registry.deliver(handle.clone(), text.as_str().to_owned()).await {
                        outcome = Err(ConnectionError::Registry(e));
                        break;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(handle = %handle, len = data.len(), "Ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    break;
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(handle = %handle, error = %e, "Transport error");
                    break;
                }
            }
        }

        state.close();

        // Drops the session and with it the writer's channel
        if let Err(e) = registry.unregister(handle.clone()).await {
            debug!(handle = %handle, error = %e, "Unregister failed");
        }

        writer_stop.cancel();
        if let Err(e) = writer.await {
            warn!(handle = %handle, error = %e, "Writer task failed");
        }

        info!(handle = %handle, "Client disconnected");
        outcome
    }
}

/// Spawns the task that drains a session's transport into the socket.
///
/// Exits when the transport's sender is dropped (the session was
/// unregistered), when `stop` fires with nothing left queued, or when a
/// write fails. Sends a close frame on the way out.
fn spawn_writer(
    mut sink: WsSink,
    mut outbound: UnboundedReceiver<OutboundFrame>,
    stop: CancellationToken,
    handle: Handle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;

                frame = outbound.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },

                _ = stop.cancelled() => break,
            };

            if let Err(e) = sink.send(Message::text(frame.to_string())).await {
                debug!(handle = %handle, error = %e, "Write failed, stopping writer");
                break;
            }
        }

        // Closing an already-closed socket is not interesting
        let _ = sink.close().await;
    })
}

/// Tells a client it could not be registered, then closes.
async fn reject(sink: &mut WsSink, error: &RegistryError) {
    let frame = CloseFrame {
        code: CloseCode::Again,
        reason: error.to_string().into(),
    };

    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Failed to send rejection close frame");
    }
    let _ = sink.close().await;
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
