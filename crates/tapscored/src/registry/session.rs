//! Live sessions and their outbound transports.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use tapscore_core::{Handle, Score, SessionView};

/// An encoded text frame queued for delivery.
///
/// Shared so a broadcast encodes once and hands the same frame to every
/// recipient.
pub type OutboundFrame = Arc<str>;

/// Outbound half of a client connection.
///
/// Wraps the sending side of the channel drained by the connection's writer
/// task. Sends never block and never retry: once the writer is gone the
/// transport reports itself closed and frames are dropped.
#[derive(Debug)]
pub struct Transport {
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

impl Transport {
    /// Creates a transport and the receiver its writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Returns true while the connection's writer still accepts frames.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queues a frame for delivery.
    ///
    /// Returns false (and drops the frame) if the transport is not open.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        self.is_open() && self.sender.send(Arc::clone(frame)).is_ok()
    }
}

/// Server-side state of one connected client.
#[derive(Debug)]
pub struct Session {
    handle: Handle,
    transport: Transport,
    score: Score,
    last_activity: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(handle: Handle, transport: Transport, now: DateTime<Utc>) -> Self {
        Self {
            handle,
            transport,
            score: 0,
            last_activity: now,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Returns true if the transport still accepts frames.
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Queues a frame on this session's transport; see [`Transport::send`].
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        self.transport.send(frame)
    }

    pub(crate) fn set_score(&mut self, score: Score) {
        self.score = score;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Builds a read-only snapshot of the session.
    pub fn view(&self) -> SessionView {
        SessionView {
            handle: self.handle.clone(),
            score: self.score,
            last_activity: self.last_activity,
            open: self.is_open(),
        }
    }
}
