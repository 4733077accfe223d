//! Registry actor - owns the session registry and processes commands.
//!
//! The RegistryActor is the single owner of session state in the relay.
//! Connection tasks and the best-player broadcaster run concurrently on the
//! tokio runtime, but every registry mutation, every routed frame and every
//! best-score scan happens here, one command at a time.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply send failures are ignored (the requester went away)

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tapscore_core::Handle;

use crate::broadcaster;
use crate::router;

use super::commands::{RegistryCommand, RegistryError};
use super::session::Transport;
use super::store::SessionRegistry;

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all session state.
///
/// Implements the actor pattern: receives commands via mpsc channel and
/// processes them sequentially. The sequential loop is the registry's only
/// concurrency control, so the registry itself carries no locks.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Session storage
    registry: SessionRegistry,
}

impl RegistryActor {
    /// Creates a new registry actor around an empty registry.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>, registry: SessionRegistry) -> Self {
        Self { receiver, registry }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            sessions = self.registry.len(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                transport,
                respond_to,
            } => {
                let result = self.handle_register(transport);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister { handle, respond_to } => {
                let removed = self.handle_unregister(&handle);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Inbound { handle, text } => {
                self.handle_inbound(&handle, &text);
            }
            RegistryCommand::BroadcastBest { window, respond_to } => {
                let outcome = broadcaster::broadcast_best(&self.registry, window, Utc::now());
                let _ = respond_to.send(outcome);
            }
            RegistryCommand::GetSession { handle, respond_to } => {
                let view = self.registry.get(&handle).map(|s| s.view());
                let _ = respond_to.send(view);
            }
            RegistryCommand::GetAllSessions { respond_to } => {
                let _ = respond_to.send(self.registry.views());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_register(&mut self, transport: Transport) -> Result<Handle, RegistryError> {
        match self.registry.register(transport, Utc::now()) {
            Ok(handle) => {
                debug!(
                    handle = %handle,
                    total_sessions = self.registry.len(),
                    "New connection"
                );
                Ok(handle)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    current = self.registry.len(),
                    "Rejecting connection"
                );
                Err(e)
            }
        }
    }

    fn handle_unregister(&mut self, handle: &Handle) -> bool {
        match self.registry.unregister(handle) {
            Some(session) => {
                debug!(
                    handle = %handle,
                    score = session.score(),
                    idle_ms = session.view().idle_for(Utc::now()).num_milliseconds(),
                    remaining_sessions = self.registry.len(),
                    "Connection closed"
                );
                true
            }
            None => {
                debug!(handle = %handle, "Close for unknown session, ignoring");
                false
            }
        }
    }

    fn handle_inbound(&mut self, handle: &Handle, text: &str) {
        if let Err(e) = router::route(&mut self.registry, handle, text, Utc::now()) {
            // Local to this frame: the session stays connected
            debug!(handle = %handle, error = %e, "Malformed frame");
        }
    }

    /// Returns the number of sessions currently registered.
    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }
}
