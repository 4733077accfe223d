//! WebSocket server for the relay.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a ConnectionHandler for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └───────┬─────────┘     └────────┬────────┘
//!         │                        │ Transport
//!         ▼                        ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   read loop     │     │  writer task    │
//! └─────────────────┘     └─────────────────┘
//! ```

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionState, MAX_MESSAGE_SIZE};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::registry::RegistryHandle;

/// How long shutdown waits for open connections to send their close frames.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// WebSocket server for the relay.
pub struct RelayServer {
    listener: TcpListener,

    /// Address actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter, for logs
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// `ServerError::Bind` if the address is unavailable. This is the one
    /// fatal error at startup.
    pub async fn bind(
        addr: SocketAddr,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let bind_error = |e: std::io::Error| ServerError::Bind {
            addr,
            error: e.to_string(),
        };

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Self {
            listener,
            local_addr,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered, then
    /// gives open connections a grace period to close.
    pub async fn run(self) {
        info!(addr = %self.local_addr, "Relay server listening");

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            let handler = ConnectionHandler::new(
                                stream,
                                self.registry.clone(),
                                self.cancel_token.clone(),
                                conn_num,
                            );
                            connections.spawn(async move {
                                if let Err(e) = handler.run().await {
                                    debug!(connection = conn_num, error = %e, "Connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }

                // Reap finished connection tasks
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        self.drain(connections).await;
    }

    async fn drain(&self, mut connections: JoinSet<()>) {
        let open = connections.len();
        if open == 0 {
            return;
        }

        debug!(open, "Waiting for connections to close");
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "Connections still open after grace period, aborting"
            );
            connections.abort_all();
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::spawn_registry;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:8080".parse().unwrap(),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("0.0.0.0:8080"));
        assert!(err.to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn test_bind_port_zero_resolves() {
        let server = RelayServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            spawn_registry(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = RelayServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            spawn_registry(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let taken = first.local_addr();
        let result = RelayServer::bind(taken, spawn_registry(), CancellationToken::new()).await;

        assert!(matches!(result, Err(ServerError::Bind { addr, .. }) if addr == taken));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let server = RelayServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            spawn_registry(),
            cancel.clone(),
        )
        .await
        .unwrap();

        let task = tokio::spawn(server.run());
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}
