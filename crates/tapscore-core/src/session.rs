//! Read-only session snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Handle, Score};

/// Returns true if `last_activity` is strictly within `window` before `now`.
///
/// A session last heard from exactly `window` ago is no longer active.
pub fn active_within(last_activity: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    last_activity > now - window
}

/// Snapshot of one connected client's state, as handed out by the registry.
///
/// The live session (which owns the transport) never leaves the registry;
/// queries return this view instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Server-assigned handle
    pub handle: Handle,

    /// Last score the client reported
    pub score: Score,

    /// Time of the last inbound message (or of connection, if none yet)
    pub last_activity: DateTime<Utc>,

    /// Whether the transport still accepts outbound frames
    pub open: bool,
}

impl SessionView {
    /// Returns true if the session had activity strictly within `window`
    /// before `now`.
    #[must_use]
    pub fn is_active(&self, window: Duration, now: DateTime<Utc>) -> bool {
        active_within(self.last_activity, window, now)
    }

    /// Time since the last inbound message, clamped at zero.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).max(Duration::zero())
    }
}
