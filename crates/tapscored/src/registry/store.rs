//! The session registry - in-memory map from handle to session.
//!
//! `SessionRegistry` is a plain owned value with no interior locking. In
//! the daemon it is owned by the [`RegistryActor`](super::RegistryActor),
//! whose sequential command loop is the only thing that ever touches it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use tapscore_core::{active_within, Handle, Score, SessionView};

use super::commands::RegistryError;
use super::session::{Session, Transport};

/// Maximum number of sessions the registry can hold.
pub const MAX_SESSIONS: usize = 10_000;

/// In-memory registry of connected clients.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<Handle, Session>,

    /// Sequence number of the next handle; never decremented.
    next_sequence: u64,

    capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates an empty registry holding at most [`MAX_SESSIONS`] sessions.
    pub fn new() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }

    /// Creates an empty registry with a custom session limit.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_sequence: 0,
            capacity,
        }
    }

    /// Allocates a fresh handle and stores a new session with score 0.
    ///
    /// # Errors
    ///
    /// - `RegistryError::RegistryFull` if the registry is at capacity. No
    ///   handle is consumed in that case.
    pub fn register(
        &mut self,
        transport: Transport,
        now: DateTime<Utc>,
    ) -> Result<Handle, RegistryError> {
        if self.sessions.len() >= self.capacity {
            return Err(RegistryError::RegistryFull { max: self.capacity });
        }

        let handle = Handle::from_sequence(self.next_sequence);
        self.next_sequence += 1;

        self.sessions
            .insert(handle.clone(), Session::new(handle.clone(), transport, now));

        Ok(handle)
    }

    /// Removes a session. Unknown handles are a no-op.
    pub fn unregister(&mut self, handle: &Handle) -> Option<Session> {
        self.sessions.remove(handle)
    }

    /// Marks activity on a session. Returns false if the handle is unknown.
    pub fn touch(&mut self, handle: &Handle, now: DateTime<Utc>) -> bool {
        match self.sessions.get_mut(handle) {
            Some(session) => {
                session.touch(now);
                true
            }
            None => {
                debug!(handle = %handle, "Touch for unknown session");
                false
            }
        }
    }

    /// Overwrites a session's score. Returns false if the handle is unknown.
    pub fn set_score(&mut self, handle: &Handle, score: Score) -> bool {
        match self.sessions.get_mut(handle) {
            Some(session) => {
                session.set_score(score);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, handle: &Handle) -> Option<&Session> {
        self.sessions.get(handle)
    }

    /// Sessions whose last activity is strictly within `window` before `now`.
    ///
    /// The iterator is lazy and can be cloned to scan the same set again.
    pub fn all_active(
        &self,
        window: Duration,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &Session> + Clone + '_ {
        self.sessions
            .values()
            .filter(move |session| active_within(session.last_activity(), window, now))
    }

    /// Every session except `excluded`; `None` yields every session.
    pub fn all_except<'a>(
        &'a self,
        excluded: Option<&'a Handle>,
    ) -> impl Iterator<Item = &'a Session> + Clone + 'a {
        self.sessions
            .values()
            .filter(move |session| Some(session.handle()) != excluded)
    }

    /// Snapshots of every session.
    pub fn views(&self) -> Vec<SessionView> {
        self.sessions.values().map(Session::view).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
