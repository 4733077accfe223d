//! Per-connection handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every server-assigned handle.
pub const HANDLE_PREFIX: &str = "p";

/// Opaque identifier the relay assigns to a connection.
///
/// Server-assigned handles have the form `p<N>` where `N` is a counter that
/// starts at 0 when the process starts and is never reused while it runs.
/// Handles are not unique across restarts.
///
/// Handles received from clients (the `to` of a `give`) are arbitrary
/// strings; they are wrapped as-is and simply fail to match any live
/// session if they were never assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Wraps a raw string as a handle without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds the handle for the given allocation sequence number.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{HANDLE_PREFIX}{sequence}"))
    }

    /// Extracts the sequence number of a server-assigned handle.
    ///
    /// Returns `None` for strings that are not of the form `p<N>`.
    pub fn sequence(&self) -> Option<u64> {
        let digits = self.0.strip_prefix(HANDLE_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Handle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Handle {
    fn from(s: String) -> Self {
        Self(s)
    }
}
