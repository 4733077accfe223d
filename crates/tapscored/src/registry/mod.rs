//! Session registry using Actor pattern.
//!
//! The registry is the central state manager for all connected clients.
//! It receives commands via a tokio mpsc channel and maintains the
//! canonical source of truth for session data.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ ConnectionHandler│────▶│  RegistryActor  │────▶│   Transports    │
//! │  BestBroadcaster │     │ (SessionRegistry│     │ (per-connection │
//! └─────────────────┘     │  + router)      │     │  mpsc senders)  │
//!         │               └─────────────────┘     └─────────────────┘
//!         │   RegistryCommand     │                       │
//!         │   (mpsc channel)      │   OutboundFrame       │
//!         ▼                       ▼                       ▼
//!   Register/Inbound/       HashMap<Handle,         Writer tasks push
//!   Unregister/Best           Session>              frames to sockets
//! ```

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;
mod session;
mod store;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError};
pub use handle::RegistryHandle;
pub use session::{OutboundFrame, Session, Transport};
pub use store::{SessionRegistry, MAX_SESSIONS};

/// Channel buffer size
const COMMAND_BUFFER: usize = 1024;

/// Spawn the registry actor and return a handle for interaction.
///
/// # Example
///
/// ```no_run
/// use tapscored::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///
///     let sessions = handle.get_all_sessions().await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    spawn_registry_with(SessionRegistry::new())
}

/// Spawn the registry actor around a pre-built (empty) registry.
pub fn spawn_registry_with(registry: SessionRegistry) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx, registry);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
