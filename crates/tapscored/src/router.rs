//! Message router - turns inbound client frames into registry mutations
//! and outbound sends.
//!
//! Runs inside the registry actor, so it sees the registry exclusively for
//! the duration of one frame. Every frame first refreshes the sender's
//! activity time, even when it then fails to decode.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Number;
use tracing::{debug, error};

use tapscore_core::Handle;
use tapscore_protocol::{ClientAction, ClientFrame, ProtocolError, ServerMessage};

use crate::registry::{OutboundFrame, Session, SessionRegistry};

/// What routing one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSummary {
    /// Actions carried by the frame
    pub actions: usize,

    /// Outbound frames queued on other sessions' transports
    pub delivered: usize,

    /// Unknown or invalid actions that were skipped
    pub ignored: usize,
}

/// Routes one inbound text frame from `sender`.
///
/// # Errors
///
/// Returns the decode error if the frame is not a JSON object. The error
/// concerns this frame only; the caller logs it and carries on.
pub fn route(
    registry: &mut SessionRegistry,
    sender: &Handle,
    text: &str,
    now: DateTime<Utc>,
) -> Result<RouteSummary, ProtocolError> {
    debug!(handle = %sender, "New message: {text}");

    registry.touch(sender, now);

    let frame = ClientFrame::parse(text)?;
    let mut summary = RouteSummary::default();

    for action in frame {
        summary.actions += 1;
        match action {
            ClientAction::Score(score) => {
                registry.set_score(sender, score);
            }
            ClientAction::ClaimPoints => {
                summary.delivered += claim_points(registry, sender);
            }
            ClientAction::Give { to, amount } => {
                summary.delivered += give(registry, sender, &to, amount);
            }
            ClientAction::Unknown { action } => {
                debug!(handle = %sender, "Unknown action: {action}");
                summary.ignored += 1;
            }
            ClientAction::Invalid { action, reason } => {
                debug!(handle = %sender, action = %action, reason = %reason, "Invalid action payload");
                summary.ignored += 1;
            }
        }
    }

    Ok(summary)
}

/// Broadcasts the sender's current score as a claim to every other session.
fn claim_points(registry: &SessionRegistry, sender: &Handle) -> usize {
    let Some(session) = registry.get(sender) else {
        debug!(handle = %sender, "Claim from closed session, dropping");
        return 0;
    };

    let msg = ServerMessage::claim(sender.clone(), session.score());
    fan_out(registry.all_except(Some(sender)), &msg)
}

/// Forwards `amount` to the single session `to`, if it is live.
fn give(registry: &SessionRegistry, sender: &Handle, to: &Handle, amount: Number) -> usize {
    let Some(target) = registry.get(to) else {
        debug!(
            handle = %sender,
            to = %to,
            well_formed = to.sequence().is_some(),
            "Give to unknown session, dropping"
        );
        return 0;
    };

    fan_out(std::iter::once(target), &ServerMessage::add(amount))
}

/// Encodes `msg` once and queues it on each recipient's transport.
///
/// Recipients whose transport is not open are skipped silently. Returns the
/// number of frames queued.
pub(crate) fn fan_out<'a>(
    recipients: impl Iterator<Item = &'a Session>,
    msg: &ServerMessage,
) -> usize {
    let frame: OutboundFrame = match msg.to_frame() {
        Ok(text) => Arc::from(text),
        Err(e) => {
            error!(kind = msg.kind(), error = %e, "Failed to encode message");
            return 0;
        }
    };

    recipients.filter(|session| session.send(&frame)).count()
}
