//! tapscore core - shared domain types for the relay
//!
//! This crate provides the types shared between the wire protocol
//! (`tapscore-protocol`) and the relay daemon (`tapscored`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod handle;
pub mod score;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use handle::{Handle, HANDLE_PREFIX};
pub use score::{coerce_score, Score};
pub use session::{active_within, SessionView};
