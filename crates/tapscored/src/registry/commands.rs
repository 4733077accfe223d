//! Registry actor commands and errors.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations

use chrono::Duration;
use tapscore_core::{Handle, SessionView};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::broadcaster::BestBroadcast;

use super::session::Transport;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Queries and lifecycle commands carry a oneshot channel for the reply.
/// `Inbound` is fire-and-forget: the connection task does not wait for its
/// frames to be routed, only for them to be queued in order.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a freshly opened connection.
    ///
    /// # Errors
    /// - `RegistryError::RegistryFull` if at maximum capacity
    Register {
        /// Outbound half of the new connection
        transport: Transport,
        /// Channel to send the assigned handle
        respond_to: oneshot::Sender<Result<Handle, RegistryError>>,
    },

    /// Remove a closed connection. Replies whether a session was removed.
    Unregister {
        /// Handle of the closed connection
        handle: Handle,
        /// Channel to send the result
        respond_to: oneshot::Sender<bool>,
    },

    /// A text frame received from a client, to be routed.
    Inbound {
        /// Sender of the frame
        handle: Handle,
        /// Raw frame text
        text: String,
    },

    /// Scan recently active sessions and broadcast the best score.
    ///
    /// Replies `None` when the broadcast was suppressed.
    BroadcastBest {
        /// Recency window for "active"
        window: Duration,
        /// Channel to send the outcome
        respond_to: oneshot::Sender<Option<BestBroadcast>>,
    },

    /// Get a single session by handle.
    GetSession {
        /// Handle of the session to retrieve
        handle: Handle,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<SessionView>>,
    },

    /// Get all sessions as views.
    GetAllSessions {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<SessionView>>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry has reached its maximum session capacity.
    #[error("registry is full (max: {max} sessions)")]
    RegistryFull {
        /// Maximum number of sessions allowed
        max: usize,
    },

    /// The command or response channel was closed.
    ///
    /// This typically indicates the actor was shut down.
    #[error("registry channel closed")]
    ChannelClosed,
}
