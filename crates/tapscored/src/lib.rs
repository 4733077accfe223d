//! tapscore relay - session registry, message router and best-player
//! broadcaster behind a WebSocket server.
//!
//! This crate provides the core infrastructure for the relay daemon:
//! - `registry` - Session registry actor, sole owner of session state
//! - `router` - Applies inbound client actions (score, claim, give)
//! - `broadcaster` - Periodic best-score broadcast
//! - `server` - WebSocket listener and per-connection handlers
//! - `config` - Environment configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     tapscored relay                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  RelayServer    │────▶│     RegistryActor           │   │
//! │  │ (WebSocket)     │     │  (session state + router)   │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ BroadcastBest     │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ConnectionHandler│     │   best broadcaster task     │   │
//! │  │  (per client)   │     │   (fixed period)            │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//!   outside tests
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod broadcaster;
pub mod config;
pub mod registry;
pub mod router;
pub mod server;
